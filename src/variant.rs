//! Hardware variants.
//!
//! Each supported board differs in pin counts, in which logical IO is a
//! GPIO line and which is proxied by a serial board, and in the serial
//! telemetry it carries. The set is closed and chosen once at start-up:
//!
//! | Variant | Inputs | Outputs | Serial |
//! |---------|--------|---------|--------|
//! | [`VariantKind::Single`] | GPIO 0 | GPIO 12 | console |
//! | [`VariantKind::Dual`] | relay board bits 0..4 | relay board bits 0..4 | relay board, 19 200 baud |
//! | [`VariantKind::Telemetry`] | GPIO 0 | GPIO 12 | meter on UART1, heating controller on UART2 |
//!
//! Every variant drives a status LED on GPIO 13.

use alloc::vec::Vec;

use tracing::{debug, info};

use crate::codec::relay::{encode_relay_states, RelayFrame, RELAY_BAUD};
use crate::codec::{
    HeatingController, HeatingReading, MeterReading, MeterTelegramCodec, RelayBoardCodec,
};
use crate::config::TelemetryConfig;
use crate::io::{IndicatorPin, InputPin, IoRegistry, OutputPin};
use crate::traits::{Delay, Gpio, PinMode, SerialPort};
use crate::trigger::{DwellBucket, PublishTrigger, TriggerAction};

/// Indices below this are proxied by the relay board on the dual variant.
pub const RELAY_BOARD_CHANNELS: usize = 4;

/// Something a board reported while refreshing.
#[derive(Clone, Debug, PartialEq)]
pub enum BoardEvent {
    /// A button is stuck down.
    Stuck,
    /// The stuck button was released.
    Unstuck,
    /// A meter telegram validated.
    Meter(MeterReading),
    /// The heating controller answered.
    Heating(HeatingReading),
}

/// Capability interface every variant implements.
///
/// Reads and writes address IO by logical index; `pin` is the number from
/// the pin table and only matters for GPIO-backed entries.
pub trait Board {
    /// Prepare input `index` for sampling.
    fn setup_input(&mut self, index: usize, pin: u8);

    /// Prepare output `index` for driving.
    fn setup_output(&mut self, index: usize, pin: u8);

    /// Current level of input `index`.
    fn read_input(&mut self, index: usize, pin: u8) -> bool;

    /// Current value of output `index`.
    fn read_output(&mut self, index: usize, pin: u8) -> bool;

    /// Set output `index`. Proxied outputs change on the next [`Board::flush`].
    fn write_output(&mut self, index: usize, pin: u8, value: bool);

    /// Consume whatever the serial boards sent since the last tick.
    fn refresh(&mut self, now_ms: u64, delay: &mut dyn Delay) -> Vec<BoardEvent>;

    /// Push proxied output values to their board.
    fn flush(&mut self);

    /// Drive a PWM duty on an indicator pin.
    fn drive_indicator(&mut self, pin: u8, duty: u32);
}

// ============================================================================
// Variant profiles
// ============================================================================

/// Identifier of a supported board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantKind {
    /// One button and one relay on GPIO (S20, basic and touch boards).
    Single,
    /// Four buttons and relays behind the relay-board protocol.
    Dual,
    /// Single layout plus meter and heating-controller telemetry.
    Telemetry,
}

impl VariantKind {
    /// Parse a variant name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        [VariantKind::Single, VariantKind::Dual, VariantKind::Telemetry]
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Canonical name.
    pub const fn name(self) -> &'static str {
        match self {
            VariantKind::Single => "single",
            VariantKind::Dual => "dual",
            VariantKind::Telemetry => "telemetry",
        }
    }

    /// Whether the console UART is free for log output. Only the relay
    /// board protocol runs on the console; telemetry lines use UART1/UART2.
    pub const fn serial_logging_allowed(self) -> bool {
        !matches!(self, VariantKind::Dual)
    }

    /// Wraparound limit of the counted-output pattern.
    pub const fn output_limit(self) -> u8 {
        match self {
            VariantKind::Dual => 3,
            VariantKind::Single | VariantKind::Telemetry => 0,
        }
    }

    /// Actions for stuck (slot 0) and unstuck (slot 1) events.
    pub const fn stuck_triggers(self) -> [Option<TriggerAction>; 2] {
        match self {
            VariantKind::Dual => [Some(TriggerAction::ResetConfig), None],
            VariantKind::Single | VariantKind::Telemetry => [None, None],
        }
    }

    /// Pin tables of this board.
    pub fn io_layout(self) -> IoRegistry {
        match self {
            VariantKind::Single | VariantKind::Telemetry => IoRegistry::new()
                .with_input(
                    InputPin::new(0)
                        .with_publish_trigger(PublishTrigger::OnHigh)
                        .with_trigger(DwellBucket::Short, TriggerAction::ToggleOutput)
                        .with_trigger(DwellBucket::Held, TriggerAction::ResetConfig),
                )
                .with_output(OutputPin::new(12))
                .with_indicator(IndicatorPin::new(13)),
            VariantKind::Dual => {
                let mut io = IoRegistry::new();
                for bit in 0..RELAY_BOARD_CHANNELS as u8 {
                    io = io
                        .with_input(InputPin::new(1 << bit))
                        .with_output(OutputPin::new(1 << bit));
                }
                io.set_input_trigger(2, DwellBucket::Short, TriggerAction::CountedOutput);
                io.set_publish_trigger(2, PublishTrigger::AnyAfterDwell);
                io.with_indicator(IndicatorPin::new(13))
            }
        }
    }
}

// ============================================================================
// Boards
// ============================================================================

/// Board whose IO is all GPIO.
#[derive(Debug)]
pub struct GpioBoard<G> {
    gpio: G,
}

impl<G: Gpio> GpioBoard<G> {
    /// Wrap a GPIO bank.
    pub fn new(gpio: G) -> Self {
        Self { gpio }
    }

    /// The GPIO bank.
    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    /// The GPIO bank, mutably.
    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }
}

impl<G: Gpio> Board for GpioBoard<G> {
    fn setup_input(&mut self, _index: usize, pin: u8) {
        self.gpio.configure(pin, PinMode::Input);
    }

    fn setup_output(&mut self, _index: usize, pin: u8) {
        self.gpio.configure(pin, PinMode::Output);
    }

    fn read_input(&mut self, _index: usize, pin: u8) -> bool {
        self.gpio.read(pin)
    }

    fn read_output(&mut self, _index: usize, pin: u8) -> bool {
        self.gpio.read(pin)
    }

    fn write_output(&mut self, _index: usize, pin: u8, value: bool) {
        self.gpio.write(pin, value);
    }

    fn refresh(&mut self, _now_ms: u64, _delay: &mut dyn Delay) -> Vec<BoardEvent> {
        Vec::new()
    }

    fn flush(&mut self) {}

    fn drive_indicator(&mut self, pin: u8, duty: u32) {
        self.gpio.write_duty(pin, duty);
    }
}

/// Board whose first four inputs and outputs live on the relay board.
///
/// Indices from [`RELAY_BOARD_CHANNELS`] on fall back to GPIO.
#[derive(Debug)]
pub struct RelayBoard<G, S> {
    local: GpioBoard<G>,
    serial: S,
    codec: RelayBoardCodec,
    inputs: u8,
    outputs: u8,
}

impl<G: Gpio, S: SerialPort> RelayBoard<G, S> {
    /// Take over `serial` at the relay-board line speed.
    pub fn new(gpio: G, mut serial: S) -> Self {
        serial.set_baud_rate(RELAY_BAUD);
        Self {
            local: GpioBoard::new(gpio),
            serial,
            codec: RelayBoardCodec::new(),
            inputs: 0,
            outputs: 0,
        }
    }

    /// Serial line to the relay board.
    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    fn proxied(index: usize) -> Option<u8> {
        (index < RELAY_BOARD_CHANNELS).then(|| 1 << index)
    }

    fn apply(&mut self, frame: RelayFrame, events: &mut Vec<BoardEvent>) {
        match frame {
            RelayFrame::States(mask) => {
                let mask = mask & ((1 << RELAY_BOARD_CHANNELS) - 1);
                self.inputs = mask;
                self.outputs = mask;
            }
            RelayFrame::Stuck => {
                info!("relay board: button stuck");
                events.push(BoardEvent::Stuck);
            }
            RelayFrame::Unstuck => {
                info!("relay board: button released");
                events.push(BoardEvent::Unstuck);
            }
        }
    }
}

impl<G: Gpio, S: SerialPort> Board for RelayBoard<G, S> {
    fn setup_input(&mut self, index: usize, pin: u8) {
        if Self::proxied(index).is_none() {
            self.local.setup_input(index, pin);
        }
    }

    fn setup_output(&mut self, index: usize, pin: u8) {
        if Self::proxied(index).is_none() {
            self.local.setup_output(index, pin);
        }
    }

    fn read_input(&mut self, index: usize, pin: u8) -> bool {
        match Self::proxied(index) {
            Some(bit) => self.inputs & bit != 0,
            None => self.local.read_input(index, pin),
        }
    }

    fn read_output(&mut self, index: usize, pin: u8) -> bool {
        match Self::proxied(index) {
            Some(bit) => self.outputs & bit != 0,
            None => self.local.read_output(index, pin),
        }
    }

    fn write_output(&mut self, index: usize, pin: u8, value: bool) {
        match Self::proxied(index) {
            Some(bit) if value => self.outputs |= bit,
            Some(bit) => self.outputs &= !bit,
            None => self.local.write_output(index, pin, value),
        }
    }

    fn refresh(&mut self, _now_ms: u64, _delay: &mut dyn Delay) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        for frame in self.codec.receive(&mut self.serial) {
            self.apply(frame, &mut events);
        }
        events
    }

    fn flush(&mut self) {
        debug!("relay board: sending outputs {:04b}", self.outputs);
        self.serial.write_all(&encode_relay_states(self.outputs));
    }

    fn drive_indicator(&mut self, pin: u8, duty: u32) {
        self.local.drive_indicator(pin, duty);
    }
}

/// GPIO board with a meter and a heating controller on two serial lines.
#[derive(Debug)]
pub struct TelemetryBoard<G, S> {
    local: GpioBoard<G>,
    meter_serial: S,
    heating_serial: S,
    meter: MeterTelegramCodec,
    heating: HeatingController,
}

impl<G: Gpio, S: SerialPort> TelemetryBoard<G, S> {
    /// Configure both serial lines from `config`.
    pub fn new(gpio: G, mut meter_serial: S, mut heating_serial: S, config: &TelemetryConfig) -> Self {
        meter_serial.set_baud_rate(config.meter_baud);
        heating_serial.set_baud_rate(config.heating_baud);
        Self {
            local: GpioBoard::new(gpio),
            meter_serial,
            heating_serial,
            meter: MeterTelegramCodec::new(),
            heating: HeatingController::new(
                config.heating_interval_ms,
                config.heating_response_delay_ms,
            ),
        }
    }

    /// Serial line from the meter.
    pub fn meter_serial_mut(&mut self) -> &mut S {
        &mut self.meter_serial
    }

    /// Serial line to the heating controller.
    pub fn heating_serial_mut(&mut self) -> &mut S {
        &mut self.heating_serial
    }
}

impl<G: Gpio, S: SerialPort> Board for TelemetryBoard<G, S> {
    fn setup_input(&mut self, index: usize, pin: u8) {
        self.local.setup_input(index, pin);
    }

    fn setup_output(&mut self, index: usize, pin: u8) {
        self.local.setup_output(index, pin);
    }

    fn read_input(&mut self, index: usize, pin: u8) -> bool {
        self.local.read_input(index, pin)
    }

    fn read_output(&mut self, index: usize, pin: u8) -> bool {
        self.local.read_output(index, pin)
    }

    fn write_output(&mut self, index: usize, pin: u8, value: bool) {
        self.local.write_output(index, pin, value);
    }

    fn refresh(&mut self, now_ms: u64, delay: &mut dyn Delay) -> Vec<BoardEvent> {
        let mut events: Vec<BoardEvent> = self
            .meter
            .receive(&mut self.meter_serial)
            .into_iter()
            .map(BoardEvent::Meter)
            .collect();
        if let Some(reading) = self.heating.poll(&mut self.heating_serial, delay, now_ms) {
            events.push(BoardEvent::Heating(reading));
        }
        events
    }

    fn flush(&mut self) {}

    fn drive_indicator(&mut self, pin: u8, duty: u32) {
        self.local.drive_indicator(pin, duty);
    }
}

// ============================================================================
// Variant
// ============================================================================

/// The board a device runs on.
#[derive(Debug)]
pub enum Variant<G, S> {
    /// See [`VariantKind::Single`].
    Single(GpioBoard<G>),
    /// See [`VariantKind::Dual`].
    Dual(RelayBoard<G, S>),
    /// See [`VariantKind::Telemetry`].
    Telemetry(TelemetryBoard<G, S>),
}

impl<G: Gpio, S: SerialPort> Variant<G, S> {
    /// Single-relay board.
    pub fn single(gpio: G) -> Self {
        Variant::Single(GpioBoard::new(gpio))
    }

    /// Dual relay board on `serial`.
    pub fn dual(gpio: G, serial: S) -> Self {
        Variant::Dual(RelayBoard::new(gpio, serial))
    }

    /// Single-relay board with meter and heating telemetry.
    pub fn telemetry(gpio: G, meter_serial: S, heating_serial: S, config: &TelemetryConfig) -> Self {
        Variant::Telemetry(TelemetryBoard::new(gpio, meter_serial, heating_serial, config))
    }

    /// Which board this is.
    pub fn kind(&self) -> VariantKind {
        match self {
            Variant::Single(_) => VariantKind::Single,
            Variant::Dual(_) => VariantKind::Dual,
            Variant::Telemetry(_) => VariantKind::Telemetry,
        }
    }

    /// GPIO bank of the board.
    pub fn gpio(&self) -> &G {
        match self {
            Variant::Single(board) => board.gpio(),
            Variant::Dual(board) => board.local.gpio(),
            Variant::Telemetry(board) => board.local.gpio(),
        }
    }

    /// GPIO bank of the board, mutably.
    pub fn gpio_mut(&mut self) -> &mut G {
        match self {
            Variant::Single(board) => board.gpio_mut(),
            Variant::Dual(board) => board.local.gpio_mut(),
            Variant::Telemetry(board) => board.local.gpio_mut(),
        }
    }

    /// Relay-board line or meter line, if the board has one.
    pub fn primary_serial_mut(&mut self) -> Option<&mut S> {
        match self {
            Variant::Single(_) => None,
            Variant::Dual(board) => Some(board.serial_mut()),
            Variant::Telemetry(board) => Some(board.meter_serial_mut()),
        }
    }

    /// Heating-controller line, if the board has one.
    pub fn heating_serial_mut(&mut self) -> Option<&mut S> {
        match self {
            Variant::Telemetry(board) => Some(board.heating_serial_mut()),
            _ => None,
        }
    }

    fn board(&mut self) -> &mut dyn Board {
        match self {
            Variant::Single(board) => board,
            Variant::Dual(board) => board,
            Variant::Telemetry(board) => board,
        }
    }
}

impl<G: Gpio, S: SerialPort> Board for Variant<G, S> {
    fn setup_input(&mut self, index: usize, pin: u8) {
        self.board().setup_input(index, pin);
    }

    fn setup_output(&mut self, index: usize, pin: u8) {
        self.board().setup_output(index, pin);
    }

    fn read_input(&mut self, index: usize, pin: u8) -> bool {
        self.board().read_input(index, pin)
    }

    fn read_output(&mut self, index: usize, pin: u8) -> bool {
        self.board().read_output(index, pin)
    }

    fn write_output(&mut self, index: usize, pin: u8, value: bool) {
        self.board().write_output(index, pin, value);
    }

    fn refresh(&mut self, now_ms: u64, delay: &mut dyn Delay) -> Vec<BoardEvent> {
        self.board().refresh(now_ms, delay)
    }

    fn flush(&mut self) {
        self.board().flush();
    }

    fn drive_indicator(&mut self, pin: u8, duty: u32) {
        self.board().drive_indicator(pin, duty);
    }
}
