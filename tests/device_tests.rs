//! Device tick scenarios on mock hardware
//!
//! The local button is wired active low: the pin idles high and a press
//! pulls it low. Inputs publish on the high level, so the dwell reported on
//! release is how long the button was held.

use relay_bridge::codec::relay::encode_relay_states;
use relay_bridge::hal::{MemoryStore, MockClock, MockGpio, MockMqtt, MockSerial};
use relay_bridge::{Config, Device, Settings, TelemetryConfig, TickOutcome, Variant};

type TestDevice<'a> = Device<'a, MockGpio, MockSerial, MockMqtt, MockClock>;

const BUTTON: u8 = 0;
const RELAY: u8 = 12;
const LED: u8 = 13;

const INPUT_TOPIC: &str = "sonoff/relay-bridge/input/0";
const OUTPUT_TOPIC: &str = "sonoff/relay-bridge/output/0";
const SWITCH_TOPIC: &str = "sonoff/relay-bridge/switch/0";

const TELEGRAM: &[u8] = b"/ISk5\\2MT382-1000\r\n\
\r\n\
1-3:0.2.8(50)\r\n\
0-0:1.0.0(101209113020W)\r\n\
1-0:1.8.1(123456.789*kWh)\r\n\
1-0:1.8.2(002345.678*kWh)\r\n\
1-0:1.7.0(01.193*kW)\r\n\
0-1:24.2.1(101209112500W)(12785.123*m3)\r\n\
!E060\r\n";

fn single(store: &mut MemoryStore) -> TestDevice<'_> {
    let mut gpio = MockGpio::new();
    gpio.set_level(BUTTON, true);
    Device::new(
        Variant::single(gpio),
        MockMqtt::new(),
        MockClock::new(),
        store,
        &Config::default(),
    )
}

fn dual(store: &mut MemoryStore) -> TestDevice<'_> {
    Device::new(
        Variant::dual(MockGpio::new(), MockSerial::new()),
        MockMqtt::new(),
        MockClock::new(),
        store,
        &Config::default(),
    )
}

fn telemetry(store: &mut MemoryStore) -> TestDevice<'_> {
    let mut gpio = MockGpio::new();
    gpio.set_level(BUTTON, true);
    Device::new(
        Variant::telemetry(
            gpio,
            MockSerial::new(),
            MockSerial::new(),
            &TelemetryConfig::default(),
        ),
        MockMqtt::new(),
        MockClock::new(),
        store,
        &Config::default(),
    )
}

/// Hold the button from `at_ms` for `held_ms`, ticking on press and release.
fn press(device: &mut TestDevice<'_>, at_ms: u64, held_ms: u64) -> TickOutcome {
    device.clock_mut().set(at_ms);
    device.variant_mut().gpio_mut().set_level(BUTTON, false);
    device.tick();
    device.clock_mut().set(at_ms + held_ms);
    device.variant_mut().gpio_mut().set_level(BUTTON, true);
    device.tick()
}

fn payloads(device: &TestDevice<'_>, topic: &str) -> Vec<serde_json::Value> {
    device
        .bridge()
        .client()
        .published_to(topic)
        .into_iter()
        .map(|(_, payload, _)| serde_json::from_slice(payload).unwrap())
        .collect()
}

fn relay_board_tx(device: &mut TestDevice<'_>) -> Vec<u8> {
    device.variant_mut().primary_serial_mut().unwrap().take_tx()
}

fn feed_relay_board(device: &mut TestDevice<'_>, bytes: &[u8]) {
    device.variant_mut().primary_serial_mut().unwrap().feed(bytes);
}

// ============================================================================
// Local Button
// ============================================================================

#[test]
fn short_press_toggles_and_publishes_both_sides() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();

    assert_eq!(press(&mut device, 1_000, 200), TickOutcome::Continue);
    assert!(device.variant().gpio().level(RELAY));

    let client = device.bridge().client();
    let input = client.published_to(INPUT_TOPIC);
    assert_eq!(input.len(), 1);
    assert_eq!(
        input[0].1,
        br#"{"type":"bool","value":true,"state":"on","deltaTime":200}"#
    );
    assert!(!input[0].2);

    let output = client.published_to(OUTPUT_TOPIC);
    assert_eq!(output.len(), 1);
    assert_eq!(
        output[0].1,
        br#"{"type":"bool","value":true,"state":"on","deltaTime":0}"#
    );
}

#[test]
fn press_itself_is_not_published() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();

    device.clock_mut().set(1_000);
    device.variant_mut().gpio_mut().set_level(BUTTON, false);
    device.tick();
    assert!(device.bridge().client().published.is_empty());
    assert!(!device.variant().gpio().level(RELAY));
}

#[test]
fn medium_press_publishes_without_action() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();

    press(&mut device, 1_000, 1_000);
    assert!(!device.variant().gpio().level(RELAY));

    let input = payloads(&device, INPUT_TOPIC);
    assert_eq!(input.len(), 1);
    assert_eq!(input[0]["deltaTime"], 1_000);
    assert!(payloads(&device, OUTPUT_TOPIC).is_empty());
}

#[test]
fn held_press_resets_settings_and_restarts() {
    let mut store = MemoryStore::new();
    store.blob = Some(vec![0xAA; 8]);
    let mut device = single(&mut store);
    device.tick();

    assert_eq!(press(&mut device, 1_000, 6_000), TickOutcome::Restart);
    assert_eq!(payloads(&device, INPUT_TOPIC)[0]["deltaTime"], 6_000);
    drop(device);

    assert_eq!(store.saves, 1);
    assert_eq!(store.blob.as_deref(), Some(Settings::defaults().as_bytes()));
}

#[test]
fn inverted_output_reports_off() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.io_mut().set_output_inverted(0, true);
    device.tick();

    press(&mut device, 1_000, 100);
    let output = payloads(&device, OUTPUT_TOPIC);
    assert_eq!(output[0]["value"], true);
    assert_eq!(output[0]["state"], "off");
}

// ============================================================================
// Broker
// ============================================================================

#[test]
fn failed_publish_lowers_health_indicator() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();
    assert_eq!(device.variant().gpio().duty[LED as usize], Some(0));

    device.bridge_mut().client_mut().fail_publish = true;
    press(&mut device, 1_000, 200);
    assert_eq!(device.bridge().client().publish_attempts, 2);
    assert_eq!(device.variant().gpio().duty[LED as usize], Some(750));
    // The relay still switched
    assert!(device.variant().gpio().level(RELAY));

    device.bridge_mut().client_mut().fail_publish = false;
    press(&mut device, 3_000, 300);
    let input = payloads(&device, INPUT_TOPIC);
    assert_eq!(input.len(), 1);
    assert_eq!(input[0]["value"], true);
    assert_eq!(input[0]["state"], "on");
    assert_eq!(input[0]["deltaTime"], 300);
}

#[test]
fn failed_connect_is_retried_next_tick() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.bridge_mut().client_mut().fail_connect = true;
    device.tick();
    assert_eq!(device.variant().gpio().duty[LED as usize], Some(750));
    assert_eq!(device.bridge().client().disconnects, 1);

    device.bridge_mut().client_mut().fail_connect = false;
    device.tick();
    let client = device.bridge().client();
    assert_eq!(client.connect_attempts, 2);
    assert!(client.is_subscribed(SWITCH_TOPIC));
    assert_eq!(device.variant().gpio().duty[LED as usize], Some(0));
}

#[test]
fn commands_wait_for_the_tick_after_connecting() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device
        .bridge_mut()
        .client_mut()
        .queue_message(SWITCH_TOPIC, r#"{"state":"off"}"#);

    device.tick();
    assert!(!device.variant().gpio().level(RELAY));

    device.tick();
    assert!(device.variant().gpio().level(RELAY));
}

#[test]
fn command_state_mapping_is_inverted() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();

    device
        .bridge_mut()
        .client_mut()
        .queue_message(SWITCH_TOPIC, r#"{"state":"off"}"#);
    device.tick();
    assert!(device.variant().gpio().level(RELAY));

    // The change is reported by the next sample
    device.tick();
    assert_eq!(payloads(&device, OUTPUT_TOPIC)[0]["value"], true);

    device
        .bridge_mut()
        .client_mut()
        .queue_message(SWITCH_TOPIC, r#"{"state":"on"}"#);
    device.tick();
    assert!(!device.variant().gpio().level(RELAY));
}

#[test]
fn malformed_and_unknown_messages_are_skipped() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();

    let client = device.bridge_mut().client_mut();
    client.queue_message(SWITCH_TOPIC, "not json");
    client.queue_message(SWITCH_TOPIC, r#"{"level":1}"#);
    client.queue_message("sonoff/other/switch/0", r#"{"state":"off"}"#);
    device.tick();

    assert!(!device.variant().gpio().level(RELAY));
    assert!(device.bridge().client().incoming.is_empty());
}

#[test]
fn keepalive_follows_ping_interval() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();

    device.clock_mut().set(179_999);
    device.tick();
    assert_eq!(device.bridge().client().pings, 0);

    device.clock_mut().set(180_000);
    device.tick();
    assert_eq!(device.bridge().client().pings, 1);
}

#[test]
fn lost_link_reconnects_and_resubscribes() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.tick();
    device.bridge_mut().client_mut().connected = false;

    device.tick();
    let client = device.bridge().client();
    assert_eq!(client.connect_attempts, 2);
    assert_eq!(client.subscriptions, [SWITCH_TOPIC, SWITCH_TOPIC]);
}

#[test]
fn setup_mode_keeps_everything_local() {
    let mut store = MemoryStore::new();
    let mut device = single(&mut store);
    device.set_setup_mode(true);
    device.tick();

    device
        .bridge_mut()
        .client_mut()
        .queue_message(SWITCH_TOPIC, r#"{"state":"off"}"#);
    press(&mut device, 1_000, 200);

    let client = device.bridge().client();
    assert_eq!(client.connect_attempts, 0);
    assert_eq!(client.publish_attempts, 0);
    assert_eq!(client.incoming.len(), 1);
    assert!(device.variant().gpio().level(RELAY));
}

// ============================================================================
// Dual Relay Board
// ============================================================================

#[test]
fn counted_output_cycles_through_patterns() {
    let mut store = MemoryStore::new();
    let mut device = dual(&mut store);
    device.tick();

    let mut sent = Vec::new();
    for (step, buttons) in [0b0100, 0b0000, 0b0100, 0b0000].into_iter().enumerate() {
        device.clock_mut().set(600 * (step as u64 + 1));
        feed_relay_board(&mut device, &[0xA0, 0x00, buttons, 0xA1]);
        device.tick();
        sent.extend(relay_board_tx(&mut device));
    }

    let expected: Vec<u8> = [0b0001, 0b0010, 0b0011, 0b0000]
        .into_iter()
        .flat_map(encode_relay_states)
        .collect();
    assert_eq!(sent, expected);
    assert_eq!(device.output_counter(), 0);
}

#[test]
fn quick_transition_on_dwell_input_is_not_published() {
    let mut store = MemoryStore::new();
    let mut device = dual(&mut store);
    device.tick();

    device.clock_mut().set(300);
    feed_relay_board(&mut device, &[0xA0, 0x00, 0b0100, 0xA1]);
    device.tick();

    assert!(payloads(&device, "sonoff/relay-bridge/input/2").is_empty());
    assert!(relay_board_tx(&mut device).is_empty());
    assert_eq!(device.output_counter(), 0);
}

#[test]
fn relay_echo_publishes_outputs() {
    let mut store = MemoryStore::new();
    let mut device = dual(&mut store);
    device.tick();

    feed_relay_board(&mut device, &encode_relay_states(0b1001));
    device.tick();

    assert_eq!(payloads(&device, "sonoff/relay-bridge/output/0").len(), 1);
    assert_eq!(payloads(&device, "sonoff/relay-bridge/output/3").len(), 1);
    assert!(payloads(&device, "sonoff/relay-bridge/output/1").is_empty());
}

#[test]
fn switch_command_is_sent_to_relay_board() {
    let mut store = MemoryStore::new();
    let mut device = dual(&mut store);
    device.tick();

    device
        .bridge_mut()
        .client_mut()
        .queue_message("sonoff/relay-bridge/switch/1", r#"{"state":"false"}"#);
    device.tick();
    assert_eq!(relay_board_tx(&mut device), encode_relay_states(0b0010));
}

#[test]
fn stuck_button_resets_the_device() {
    let mut store = MemoryStore::new();
    let mut device = dual(&mut store);
    device.tick();

    feed_relay_board(&mut device, &[0xA0, 0xF6, 0x00, 0xA1]);
    assert_eq!(device.tick(), TickOutcome::Continue);

    feed_relay_board(&mut device, &[0xA0, 0xF5, 0x00, 0xA1]);
    assert_eq!(device.tick(), TickOutcome::Restart);
    drop(device);
    assert_eq!(store.saves, 1);
}

// ============================================================================
// Telemetry Board
// ============================================================================

fn heating_response() -> Vec<u8> {
    let mut frame = vec![0u8; 64];
    frame[0] = 0x02;
    for (i, b) in frame.iter_mut().enumerate().take(62).skip(1) {
        *b = (i * 7) as u8;
    }
    frame[21] = 0x08;
    frame[22] = 0x66;
    frame[27] = 0x07;
    frame[28] = 0xD0;
    frame[62] = 0x17;
    frame[63] = 0x03;
    frame
}

#[test]
fn heating_reading_is_published_on_schedule() {
    let mut store = MemoryStore::new();
    let mut device = telemetry(&mut store);
    device
        .variant_mut()
        .heating_serial_mut()
        .unwrap()
        .reply_with(&heating_response());
    device.tick();

    device.clock_mut().set(29_000);
    device.tick();
    assert!(payloads(&device, "sonoff/relay-bridge/heating/0").is_empty());

    device.clock_mut().set(30_000);
    device.tick();
    let heating = payloads(&device, "sonoff/relay-bridge/heating/0");
    assert_eq!(heating.len(), 1);
    assert_eq!(heating[0]["type"], "heating");
    assert_eq!(heating[0]["temperature"].as_f64(), Some(21.5));
    assert_eq!(heating[0]["setpoint"].as_f64(), Some(20.0));
    assert_eq!(device.clock().total_delay_ms, 250);
}

#[test]
fn meter_telegram_is_published() {
    let mut store = MemoryStore::new();
    let mut device = telemetry(&mut store);
    device.tick();

    device.variant_mut().primary_serial_mut().unwrap().feed(TELEGRAM);
    device.tick();

    let meter = payloads(&device, "sonoff/relay-bridge/meter/0");
    assert_eq!(meter.len(), 1);
    assert_eq!(meter[0]["tariff1"], "123456.789");
    assert_eq!(meter[0]["tariff2"], "002345.678");
    assert_eq!(meter[0]["gas"], "12785.123");
    assert_eq!(meter[0]["gasTimestamp"], "101209112500");
}

#[test]
fn corrupted_telegram_is_dropped() {
    let mut store = MemoryStore::new();
    let mut device = telemetry(&mut store);
    device.tick();

    let mut telegram = TELEGRAM.to_vec();
    telegram[75] ^= 0x01;
    device.variant_mut().primary_serial_mut().unwrap().feed(&telegram);
    device.tick();

    assert!(payloads(&device, "sonoff/relay-bridge/meter/0").is_empty());
}

#[test]
fn telemetry_board_keeps_local_button() {
    let mut store = MemoryStore::new();
    let mut device = telemetry(&mut store);
    device.tick();

    press(&mut device, 1_000, 200);
    assert!(device.variant().gpio().level(RELAY));
    assert_eq!(payloads(&device, INPUT_TOPIC).len(), 1);
}
