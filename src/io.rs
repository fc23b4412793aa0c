//! Pin tables of a device.
//!
//! A device owns three ordered tables: inputs, outputs and indicator LEDs.
//! Tables are filled once when the variant is built; afterwards only pin
//! state changes. Whether an entry is a GPIO line or a value proxied by a
//! serial board is decided by the variant, not by the table.

use alloc::vec::Vec;

use crate::config::LongString;
use crate::traits::PWM_RANGE;
use crate::trigger::{DwellBucket, PublishTrigger, TriggerAction, BUCKET_COUNT};

/// A sampled input line.
#[derive(Clone, Debug)]
pub struct InputPin {
    /// Physical pin number (or board bit for proxied inputs).
    pub pin: u8,
    /// Level read on the latest sample.
    pub current_state: bool,
    /// Level of the last observed transition.
    pub last_state: bool,
    /// Time of the last observed transition.
    pub last_state_time: u64,
    /// Which transitions are published and dispatched.
    pub publish_trigger: PublishTrigger,
    /// Report `state` as the inverse of `value`.
    pub report_inverted: bool,
    /// One optional action per dwell bucket.
    pub triggers: [Option<TriggerAction>; BUCKET_COUNT],
    /// Publish topic, assigned when the device starts.
    pub topic: LongString,
}

impl InputPin {
    /// Input on `pin`, publishing on low with no triggers.
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            current_state: false,
            last_state: false,
            last_state_time: 0,
            publish_trigger: PublishTrigger::default(),
            report_inverted: false,
            triggers: [None; BUCKET_COUNT],
            topic: LongString::new(),
        }
    }

    /// Set which transitions are published.
    pub fn with_publish_trigger(mut self, trigger: PublishTrigger) -> Self {
        self.publish_trigger = trigger;
        self
    }

    /// Register `action` for `bucket`.
    pub fn with_trigger(mut self, bucket: DwellBucket, action: TriggerAction) -> Self {
        self.triggers[bucket.index()] = Some(action);
        self
    }

    /// Report the inverse level as `state`.
    pub fn with_report_inverted(mut self, inverted: bool) -> Self {
        self.report_inverted = inverted;
        self
    }
}

/// A driven output line (relay).
#[derive(Clone, Debug)]
pub struct OutputPin {
    /// Physical pin number (or board bit for proxied outputs).
    pub pin: u8,
    /// Value read on the latest sample.
    pub current_state: bool,
    /// Last published value.
    pub last_state: bool,
    /// Report `state` as the inverse of `value`.
    pub report_inverted: bool,
    /// Publish topic, assigned when the device starts.
    pub topic: LongString,
    /// Command topic, assigned when the device starts.
    pub command_topic: LongString,
}

impl OutputPin {
    /// Output on `pin`.
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            current_state: false,
            last_state: false,
            report_inverted: false,
            topic: LongString::new(),
            command_topic: LongString::new(),
        }
    }

    /// Report the inverse level as `state`.
    pub fn with_report_inverted(mut self, inverted: bool) -> Self {
        self.report_inverted = inverted;
        self
    }
}

/// PWM-driven status LED.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndicatorPin {
    /// Physical pin number.
    pub pin: u8,
    /// Current duty cycle, `0..=PWM_RANGE`.
    pub duty_cycle: u32,
}

impl IndicatorPin {
    /// Indicator on `pin`, dark (the LEDs are active low).
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            duty_cycle: PWM_RANGE,
        }
    }
}

/// The three pin tables of a device.
#[derive(Clone, Debug, Default)]
pub struct IoRegistry {
    inputs: Vec<InputPin>,
    outputs: Vec<OutputPin>,
    indicators: Vec<IndicatorPin>,
}

impl IoRegistry {
    /// Empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input; its index is its position.
    pub fn with_input(mut self, input: InputPin) -> Self {
        self.inputs.push(input);
        self
    }

    /// Append an output; its index is its position.
    pub fn with_output(mut self, output: OutputPin) -> Self {
        self.outputs.push(output);
        self
    }

    /// Append an indicator; its index is its position.
    pub fn with_indicator(mut self, indicator: IndicatorPin) -> Self {
        self.indicators.push(indicator);
        self
    }

    /// Input table.
    pub fn inputs(&self) -> &[InputPin] {
        &self.inputs
    }

    /// Mutable input table. Entries may change, the table size may not.
    pub fn inputs_mut(&mut self) -> &mut [InputPin] {
        &mut self.inputs
    }

    /// Output table.
    pub fn outputs(&self) -> &[OutputPin] {
        &self.outputs
    }

    /// Mutable output table.
    pub fn outputs_mut(&mut self) -> &mut [OutputPin] {
        &mut self.outputs
    }

    /// Indicator table.
    pub fn indicators(&self) -> &[IndicatorPin] {
        &self.indicators
    }

    /// Mutable indicator table.
    pub fn indicators_mut(&mut self) -> &mut [IndicatorPin] {
        &mut self.indicators
    }

    /// Input `index`, if present.
    pub fn input(&self, index: usize) -> Option<&InputPin> {
        self.inputs.get(index)
    }

    /// Output `index`, if present.
    pub fn output(&self, index: usize) -> Option<&OutputPin> {
        self.outputs.get(index)
    }

    /// Indicator `index`, if present.
    pub fn indicator(&self, index: usize) -> Option<&IndicatorPin> {
        self.indicators.get(index)
    }

    /// Register `action` on input `index` for `bucket`. Unknown inputs are
    /// ignored.
    pub fn set_input_trigger(&mut self, index: usize, bucket: DwellBucket, action: TriggerAction) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.triggers[bucket.index()] = Some(action);
        }
    }

    /// Change which transitions of input `index` are published.
    pub fn set_publish_trigger(&mut self, index: usize, trigger: PublishTrigger) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.publish_trigger = trigger;
        }
    }

    /// Change whether output `index` reports its inverse level.
    pub fn set_output_inverted(&mut self, index: usize, inverted: bool) {
        if let Some(output) = self.outputs.get_mut(index) {
            output.report_inverted = inverted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_insertion_order() {
        let io = IoRegistry::new()
            .with_input(InputPin::new(0))
            .with_input(InputPin::new(14))
            .with_output(OutputPin::new(12))
            .with_indicator(IndicatorPin::new(13));

        assert_eq!(io.inputs().len(), 2);
        assert_eq!(io.input(1).map(|i| i.pin), Some(14));
        assert_eq!(io.output(0).map(|o| o.pin), Some(12));
        assert!(io.output(1).is_none());
    }

    #[test]
    fn indicator_starts_dark() {
        assert_eq!(IndicatorPin::new(13).duty_cycle, PWM_RANGE);
    }

    #[test]
    fn setters_ignore_unknown_indices() {
        let mut io = IoRegistry::new().with_input(InputPin::new(0));
        io.set_input_trigger(5, DwellBucket::Short, TriggerAction::ToggleOutput);
        io.set_publish_trigger(5, PublishTrigger::OnHigh);
        io.set_output_inverted(0, true);
        assert!(io.input(0).map_or(false, |i| i.triggers.iter().all(Option::is_none)));
    }

    #[test]
    fn setters_update_known_indices() {
        let mut io = IoRegistry::new()
            .with_input(InputPin::new(0))
            .with_output(OutputPin::new(12));
        io.set_input_trigger(0, DwellBucket::Held, TriggerAction::ResetConfig);
        io.set_publish_trigger(0, PublishTrigger::AnyAfterDwell);
        io.set_output_inverted(0, true);

        let input = io.input(0).unwrap();
        assert!(matches!(input.triggers[3], Some(TriggerAction::ResetConfig)));
        assert_eq!(input.publish_trigger, PublishTrigger::AnyAfterDwell);
        assert!(io.output(0).unwrap().report_inverted);
    }
}
