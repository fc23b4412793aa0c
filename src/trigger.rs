//! Input transition classification.
//!
//! Every observed change of an input is classified once: whether it is
//! published, and which (if any) of the pin's four trigger slots fires. The
//! slot is chosen by how long the previous state lasted:
//!
//! | Bucket | Dwell |
//! |--------|-------|
//! | [`DwellBucket::Short`] | `[0, 500)` ms |
//! | [`DwellBucket::Medium`] | `[500, 2000)` ms |
//! | [`DwellBucket::Long`] | `[2000, 5000)` ms |
//! | [`DwellBucket::Held`] | `[5000, ∞)` ms |
//!
//! # Example
//!
//! ```rust
//! use relay_bridge::io::InputPin;
//! use relay_bridge::trigger::{classify, DwellBucket, PublishTrigger, TriggerAction};
//!
//! let mut button = InputPin::new(0)
//!     .with_publish_trigger(PublishTrigger::OnHigh)
//!     .with_trigger(DwellBucket::Short, TriggerAction::ToggleOutput);
//!
//! // Pressed and released within 200 ms.
//! let dispatch = classify(&mut button, true, 200).unwrap();
//! assert!(dispatch.publish);
//! assert_eq!(dispatch.bucket, Some(DwellBucket::Short));
//! assert!(matches!(dispatch.action, Some(TriggerAction::ToggleOutput)));
//!
//! // Same level again: nothing to do.
//! assert!(classify(&mut button, true, 300).is_none());
//! ```

use tracing::debug;

use crate::io::InputPin;

/// Number of trigger slots per input.
pub const BUCKET_COUNT: usize = 4;

/// Minimum dwell for inputs that publish on any transition.
pub const MIN_ANY_DWELL_MS: u64 = 500;

const MEDIUM_FROM_MS: u64 = 500;
const LONG_FROM_MS: u64 = 2_000;
const HELD_FROM_MS: u64 = 5_000;

/// Dwell-time range selecting a trigger slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DwellBucket {
    /// Under 500 ms.
    Short = 0,
    /// 500 ms up to 2 s.
    Medium = 1,
    /// 2 s up to 5 s.
    Long = 2,
    /// 5 s or more.
    Held = 3,
}

impl DwellBucket {
    /// Bucket for a dwell of `dwell_ms`. Lower bounds are inclusive.
    pub const fn from_dwell(dwell_ms: u64) -> Self {
        if dwell_ms < MEDIUM_FROM_MS {
            DwellBucket::Short
        } else if dwell_ms < LONG_FROM_MS {
            DwellBucket::Medium
        } else if dwell_ms < HELD_FROM_MS {
            DwellBucket::Long
        } else {
            DwellBucket::Held
        }
    }

    /// Trigger slot index.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Which input level gets published.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PublishTrigger {
    /// Publish and dispatch when the input goes low.
    #[default]
    OnLow,
    /// Publish and dispatch when the input goes high.
    OnHigh,
    /// Publish every transition that follows at least
    /// [`MIN_ANY_DWELL_MS`] of stable state, firing only the first slot.
    AnyAfterDwell,
}

impl PublishTrigger {
    /// Level this trigger waits for, `None` for any level.
    pub const fn target(self) -> Option<bool> {
        match self {
            PublishTrigger::OnLow => Some(false),
            PublishTrigger::OnHigh => Some(true),
            PublishTrigger::AnyAfterDwell => None,
        }
    }
}

/// Access to outputs for trigger actions.
///
/// Implemented by the device so actions never need a global handle to it.
pub trait OutputControl {
    /// Number of outputs.
    fn output_count(&self) -> usize;

    /// Current value of output `index`.
    fn read_output(&mut self, index: usize) -> bool;

    /// Set output `index`. Takes effect on the board at the next flush.
    fn write_output(&mut self, index: usize, value: bool);

    /// Push buffered output values to the hardware.
    fn flush_outputs(&mut self);
}

/// Custom action, called with the device's outputs and the input index.
pub type CustomAction = fn(&mut dyn OutputControl, usize);

/// Action stored in a trigger slot.
#[derive(Clone, Copy, Debug)]
pub enum TriggerAction {
    /// Invert the output with the same index as the input.
    ToggleOutput,
    /// Advance the device counter and show it as a bit pattern on the outputs.
    CountedOutput,
    /// Persist default settings and restart.
    ResetConfig,
    /// Caller-provided function.
    Custom(CustomAction),
}

/// Outcome of one observed input transition.
#[derive(Clone, Copy, Debug)]
pub struct Dispatch {
    /// New level of the input.
    pub value: bool,
    /// Time the previous level lasted.
    pub dwell_ms: u64,
    /// Whether the transition is published.
    pub publish: bool,
    /// Bucket the transition fell in, if it qualified for dispatch.
    pub bucket: Option<DwellBucket>,
    /// Registered action of that bucket.
    pub action: Option<TriggerAction>,
}

/// Record a sample of `pin` and classify it if the level changed.
///
/// Returns `None` for an unchanged level. On a change, `last_state` and
/// `last_state_time` are updated whether or not anything is published or
/// fired, so one real transition yields exactly one dispatch.
pub fn classify(pin: &mut InputPin, value: bool, now_ms: u64) -> Option<Dispatch> {
    pin.current_state = value;
    if value == pin.last_state {
        return None;
    }
    let dwell_ms = now_ms.saturating_sub(pin.last_state_time);

    let bucket = match pin.publish_trigger.target() {
        None if dwell_ms > MIN_ANY_DWELL_MS => Some(DwellBucket::Short),
        None => None,
        Some(target) if target == value => Some(DwellBucket::from_dwell(dwell_ms)),
        Some(_) => None,
    };
    let action = bucket.and_then(|b| pin.triggers[b.index()]);

    debug!(
        "input on pin {} now {} after {} ms (bucket {:?})",
        pin.pin, value, dwell_ms, bucket
    );

    pin.last_state = value;
    pin.last_state_time = now_ms;

    Some(Dispatch {
        value,
        dwell_ms,
        publish: bucket.is_some(),
        bucket,
        action,
    })
}
