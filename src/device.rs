//! The device: pin tables, board, broker bridge and the tick loop.
//!
//! One [`Device`] owns everything a running board needs and is driven by a
//! single caller that calls [`Device::tick`] in a loop. A tick runs in a fixed
//! order:
//!
//! 1. refresh the board (decode serial input, poll telemetry)
//! 2. sample inputs, dispatch triggers and publish transitions
//! 3. publish changed outputs
//! 4. make sure the broker is connected, ping, drain commands
//!
//! # Example
//!
//! ```rust
//! use relay_bridge::config::Config;
//! use relay_bridge::device::{Device, TickOutcome};
//! use relay_bridge::hal::{MemoryStore, MockClock, MockGpio, MockMqtt, MockSerial};
//! use relay_bridge::variant::Variant;
//!
//! let mut store = MemoryStore::new();
//! let variant: Variant<MockGpio, MockSerial> = Variant::single(MockGpio::new());
//! let mut device = Device::new(
//!     variant,
//!     MockMqtt::new(),
//!     MockClock::new(),
//!     &mut store,
//!     &Config::default(),
//! );
//!
//! assert_eq!(device.tick(), TickOutcome::Continue);
//! assert!(device.bridge().is_connected());
//! ```

use tracing::{debug, error, info, warn};

use crate::bridge::{LinkStatus, NetworkBridge};
use crate::config::{Config, LongString, TopicKind};
use crate::error::BridgeError;
use crate::io::IoRegistry;
use crate::messages::{encode_bool_event, encode_heating_event, encode_meter_event, Payload};
use crate::settings::{Settings, SettingsStore};
use crate::traits::{Clock, Delay, Gpio, MqttClient, SerialPort, PWM_RANGE};
use crate::trigger::{classify, OutputControl, TriggerAction};
use crate::variant::{Board, BoardEvent, Variant, VariantKind};

/// Indicator that shows connection health.
pub const HEALTH_INDICATOR: usize = 0;

/// Duty percentage of the health indicator after a network failure.
pub const WARNING_DUTY_PERCENT: u8 = 75;

/// What the caller should do after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// Settings were reset; restart the device.
    Restart,
}

/// A running device.
pub struct Device<'a, G, S, C, K>
where
    C: MqttClient,
{
    io: IoRegistry,
    variant: Variant<G, S>,
    bridge: NetworkBridge<C>,
    clock: K,
    store: &'a mut dyn SettingsStore,
    meter_topic: LongString,
    heating_topic: LongString,
    output_counter: u8,
    output_limit: u8,
    stuck_triggers: [Option<TriggerAction>; 2],
    restart_requested: bool,
}

impl<'a, G, S, C, K> Device<'a, G, S, C, K>
where
    G: Gpio,
    S: SerialPort,
    C: MqttClient,
    K: Clock + Delay,
{
    /// Build a device for `variant` and initialise its IO.
    ///
    /// Topics are derived from the broker prefix and hostname in `config`.
    /// Every input and output is set up and its current level recorded, so
    /// the first tick only reports real changes.
    pub fn new(
        variant: Variant<G, S>,
        client: C,
        clock: K,
        store: &'a mut dyn SettingsStore,
        config: &Config,
    ) -> Self {
        let kind = variant.kind();
        let hostname = config.device.hostname.as_str();
        let mut device = Self {
            io: kind.io_layout(),
            variant,
            bridge: NetworkBridge::new(client, &config.mqtt),
            clock,
            store,
            meter_topic: config.mqtt.device_topic(hostname, TopicKind::Meter, 0),
            heating_topic: config.mqtt.device_topic(hostname, TopicKind::Heating, 0),
            output_counter: 0,
            output_limit: kind.output_limit(),
            stuck_triggers: kind.stuck_triggers(),
            restart_requested: false,
        };
        device.initialise_io(config);
        device
    }

    fn initialise_io(&mut self, config: &Config) {
        info!("configuring IO for {} board", self.variant.kind().name());
        let hostname = config.device.hostname.as_str();
        let now = self.clock.now_ms();

        for index in 0..self.io.inputs().len() {
            let pin = self.io.inputs()[index].pin;
            self.variant.setup_input(index, pin);
            let level = self.variant.read_input(index, pin);

            let input = &mut self.io.inputs_mut()[index];
            input.topic = config.mqtt.device_topic(hostname, TopicKind::Input, index);
            input.current_state = level;
            input.last_state = level;
            input.last_state_time = now;
        }

        for index in 0..self.io.outputs().len() {
            let pin = self.io.outputs()[index].pin;
            self.variant.setup_output(index, pin);
            let level = self.variant.read_output(index, pin);
            let command_topic = config.mqtt.device_topic(hostname, TopicKind::Switch, index);

            let output = &mut self.io.outputs_mut()[index];
            output.topic = config.mqtt.device_topic(hostname, TopicKind::Output, index);
            output.command_topic = command_topic.clone();
            output.current_state = level;
            output.last_state = level;
            self.bridge.register_subscription(command_topic, index);
        }

        for led in self.io.indicators() {
            self.variant.drive_indicator(led.pin, led.duty_cycle);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Which board this device runs on.
    pub fn kind(&self) -> VariantKind {
        self.variant.kind()
    }

    /// Pin tables.
    pub fn io(&self) -> &IoRegistry {
        &self.io
    }

    /// Pin tables, mutably. Used to register extra triggers.
    pub fn io_mut(&mut self) -> &mut IoRegistry {
        &mut self.io
    }

    /// The board.
    pub fn variant(&self) -> &Variant<G, S> {
        &self.variant
    }

    /// The board, mutably.
    pub fn variant_mut(&mut self) -> &mut Variant<G, S> {
        &mut self.variant
    }

    /// Broker bridge.
    pub fn bridge(&self) -> &NetworkBridge<C> {
        &self.bridge
    }

    /// Broker bridge, mutably.
    pub fn bridge_mut(&mut self) -> &mut NetworkBridge<C> {
        &mut self.bridge
    }

    /// Time source.
    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Time source, mutably.
    pub fn clock_mut(&mut self) -> &mut K {
        &mut self.clock
    }

    /// Current value of the counted-output pattern.
    pub fn output_counter(&self) -> u8 {
        self.output_counter
    }

    /// True once a reset has asked for a restart.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// True while network activity is suppressed.
    pub fn is_setup_mode(&self) -> bool {
        self.bridge.is_setup_mode()
    }

    /// Enter or leave setup mode.
    pub fn set_setup_mode(&mut self, setup_mode: bool) {
        if setup_mode {
            info!("setup mode: network suppressed");
        }
        self.bridge.set_setup_mode(setup_mode);
    }

    /// Replace the action of stuck-event slot `slot` (0 stuck, 1 released).
    pub fn set_stuck_trigger(&mut self, slot: usize, action: Option<TriggerAction>) {
        if let Some(entry) = self.stuck_triggers.get_mut(slot) {
            *entry = action;
        }
    }

    // ========================================================================
    // Indicators
    // ========================================================================

    /// Switch indicator `index` fully on or off.
    ///
    /// The LEDs are active low, so on is duty 0.
    pub fn set_indicator_state(&mut self, index: usize, on: bool) {
        self.drive_indicator(index, if on { 0 } else { PWM_RANGE });
    }

    /// Drive indicator `index` at `percent` of the PWM range.
    pub fn set_indicator_duty(&mut self, index: usize, percent: u8) {
        self.drive_indicator(index, (PWM_RANGE / 100) * u32::from(percent));
    }

    fn drive_indicator(&mut self, index: usize, duty: u32) {
        let Some(led) = self.io.indicators_mut().get_mut(index) else {
            return;
        };
        led.duty_cycle = duty;
        let pin = led.pin;
        self.variant.drive_indicator(pin, duty);
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Run one iteration of the main loop.
    pub fn tick(&mut self) -> TickOutcome {
        self.handle_io();
        self.handle_network();
        if self.restart_requested {
            TickOutcome::Restart
        } else {
            TickOutcome::Continue
        }
    }

    /// Refresh the board, then sample and publish all inputs and outputs.
    pub fn handle_io(&mut self) {
        let now = self.clock.now_ms();
        let events = self.variant.refresh(now, &mut self.clock);
        for event in events {
            self.handle_board_event(event);
        }

        let now = self.clock.now_ms();
        for index in 0..self.io.inputs().len() {
            self.sample_input(index, now);
        }
        for index in 0..self.io.outputs().len() {
            self.sample_output(index);
        }
    }

    fn sample_input(&mut self, index: usize, now: u64) {
        let pin = self.io.inputs()[index].pin;
        let value = self.variant.read_input(index, pin);

        let input = &mut self.io.inputs_mut()[index];
        let Some(dispatch) = classify(input, value, now) else {
            return;
        };
        let state = value ^ input.report_inverted;
        let topic = input.topic.clone();

        if dispatch.publish {
            self.publish(&topic, encode_bool_event(value, state, dispatch.dwell_ms));
        }
        if let Some(action) = dispatch.action {
            self.run_action(action, index);
        }
    }

    fn sample_output(&mut self, index: usize) {
        let pin = self.io.outputs()[index].pin;
        let value = self.variant.read_output(index, pin);

        let output = &mut self.io.outputs_mut()[index];
        output.current_state = value;
        if value == output.last_state {
            return;
        }
        debug!("output {} now {}, was {}", index, value, output.last_state);
        output.last_state = value;
        let state = value ^ output.report_inverted;
        let topic = output.topic.clone();

        self.publish(&topic, encode_bool_event(value, state, 0));
    }

    fn handle_board_event(&mut self, event: BoardEvent) {
        match event {
            BoardEvent::Stuck => self.run_stuck_trigger(0),
            BoardEvent::Unstuck => self.run_stuck_trigger(1),
            BoardEvent::Meter(reading) => {
                let topic = self.meter_topic.clone();
                self.publish(&topic, encode_meter_event(&reading));
            }
            BoardEvent::Heating(reading) => {
                let topic = self.heating_topic.clone();
                self.publish(&topic, encode_heating_event(&reading));
            }
        }
    }

    fn run_stuck_trigger(&mut self, slot: usize) {
        if let Some(action) = self.stuck_triggers[slot] {
            self.run_action(action, slot);
        }
    }

    /// Make sure the broker is connected, then ping and apply commands.
    ///
    /// A tick that had to connect does no further network work.
    pub fn handle_network(&mut self) {
        let now = self.clock.now_ms();
        match self.bridge.connect(now) {
            Ok(LinkStatus::Ready) => {}
            Ok(LinkStatus::Suppressed) => return,
            Ok(LinkStatus::Established) => {
                self.set_indicator_state(HEALTH_INDICATOR, true);
                return;
            }
            Err(_) => {
                self.set_indicator_duty(HEALTH_INDICATOR, WARNING_DUTY_PERCENT);
                return;
            }
        }

        self.bridge.keepalive(now);
        let drained = self.bridge.drain();
        for (index, value) in drained.commands {
            OutputControl::write_output(self, index, value);
        }
        if drained.received > 0 {
            self.flush_outputs();
        }
    }

    fn publish(&mut self, topic: &str, payload: Result<Payload, BridgeError>) {
        let result = payload.and_then(|payload| self.bridge.publish(topic, &payload));
        if let Err(e) = result {
            warn!("{}", e);
            self.set_indicator_duty(HEALTH_INDICATOR, WARNING_DUTY_PERCENT);
        }
    }

    // ========================================================================
    // Trigger actions
    // ========================================================================

    fn run_action(&mut self, action: TriggerAction, index: usize) {
        match action {
            TriggerAction::ToggleOutput => self.toggle_output(index),
            TriggerAction::CountedOutput => self.counted_output(),
            TriggerAction::ResetConfig => self.reset_config(),
            TriggerAction::Custom(action) => action(self, index),
        }
    }

    /// Invert output `index` if it exists, then flush.
    pub fn toggle_output(&mut self, index: usize) {
        if index < self.output_count() {
            let value = OutputControl::read_output(self, index);
            OutputControl::write_output(self, index, !value);
        }
        self.flush_outputs();
    }

    /// Advance the counter and show it as a bit pattern on the outputs.
    pub fn counted_output(&mut self) {
        info!("counted output at {}", self.output_counter);
        if self.output_counter == self.output_limit {
            self.output_counter = 0;
        } else {
            self.output_counter = self.output_counter.wrapping_add(1);
        }
        for index in 0..self.output_count() {
            let bit = index < 8 && (self.output_counter >> index) & 1 == 1;
            OutputControl::write_output(self, index, bit);
        }
        self.flush_outputs();
    }

    /// Persist the default settings and request a restart.
    pub fn reset_config(&mut self) {
        match Settings::save_defaults(&mut *self.store) {
            Ok(_) => info!("settings reset, restart requested"),
            Err(e) => error!("settings reset failed: {}", e),
        }
        self.restart_requested = true;
    }
}

impl<G, S, C, K> OutputControl for Device<'_, G, S, C, K>
where
    G: Gpio,
    S: SerialPort,
    C: MqttClient,
    K: Clock + Delay,
{
    fn output_count(&self) -> usize {
        self.io.outputs().len()
    }

    fn read_output(&mut self, index: usize) -> bool {
        match self.io.output(index) {
            Some(output) => {
                let pin = output.pin;
                self.variant.read_output(index, pin)
            }
            None => false,
        }
    }

    fn write_output(&mut self, index: usize, value: bool) {
        match self.io.output(index) {
            Some(output) => {
                let pin = output.pin;
                self.variant.write_output(index, pin, value);
            }
            None => warn!("no output {}", index),
        }
    }

    fn flush_outputs(&mut self) {
        self.variant.flush();
    }
}
