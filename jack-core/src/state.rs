//! Logical jack state shared between the detection and button machines.

use core::fmt;

use crate::lines::Level;

/// Accessory classification published to the platform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum DetectionState {
    #[default]
    NoDevice,
    HeadsetWithMic,
    HeadsetNoMic,
}

impl DetectionState {
    /// Raw code exposed by the state query interface.
    pub const fn as_raw(self) -> u8 {
        match self {
            DetectionState::NoDevice => 0,
            DetectionState::HeadsetWithMic => 1,
            DetectionState::HeadsetNoMic => 2,
        }
    }

    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(DetectionState::NoDevice),
            1 => Some(DetectionState::HeadsetWithMic),
            2 => Some(DetectionState::HeadsetNoMic),
            _ => None,
        }
    }

    /// Device name reported for the state; both headset flavours read "Headset".
    pub const fn label(self) -> &'static str {
        match self {
            DetectionState::NoDevice => "No Device",
            DetectionState::HeadsetWithMic | DetectionState::HeadsetNoMic => "Headset",
        }
    }

    pub const fn is_present(self) -> bool {
        !matches!(self, DetectionState::NoDevice)
    }

    /// Returns `true` when moving from `self` to `next` goes through `NoDevice`.
    pub const fn can_transition_to(self, next: DetectionState) -> bool {
        matches!(
            (self, next),
            (DetectionState::NoDevice, DetectionState::HeadsetWithMic)
                | (DetectionState::NoDevice, DetectionState::HeadsetNoMic)
                | (DetectionState::HeadsetWithMic, DetectionState::NoDevice)
                | (DetectionState::HeadsetNoMic, DetectionState::NoDevice)
        )
    }
}

impl fmt::Display for DetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionState::NoDevice => f.write_str("no-device"),
            DetectionState::HeadsetWithMic => f.write_str("headset"),
            DetectionState::HeadsetNoMic => f.write_str("headset-no-mic"),
        }
    }
}

/// Debounced button state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
}

impl ButtonState {
    pub const fn is_pressed(self) -> bool {
        matches!(self, ButtonState::Pressed)
    }
}

/// Electrical classification of the plugged accessory.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PoleType {
    #[default]
    ThreePole,
    FourPole,
}

impl PoleType {
    /// The switch drives the pole line high for three-pole plugs.
    pub const fn from_level(level: Level) -> Self {
        match level {
            Level::High => PoleType::ThreePole,
            Level::Low => PoleType::FourPole,
        }
    }

    pub const fn level(self) -> Level {
        match self {
            PoleType::ThreePole => Level::High,
            PoleType::FourPole => Level::Low,
        }
    }

    pub const fn has_mic(self) -> bool {
        matches!(self, PoleType::FourPole)
    }
}

impl fmt::Display for PoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoleType::ThreePole => f.write_str("3-pole"),
            PoleType::FourPole => f.write_str("4-pole"),
        }
    }
}

/// Consolidated state record mutated only by the worker.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct JackState {
    pub detection: DetectionState,
    pub button: ButtonState,
    pub pole: PoleType,
    pub button_irq_enabled: bool,
}

impl JackState {
    pub const fn new() -> Self {
        Self {
            detection: DetectionState::NoDevice,
            button: ButtonState::Released,
            pole: PoleType::ThreePole,
            button_irq_enabled: false,
        }
    }

    /// Checks the cross-field invariants: a pressed button and an unmasked
    /// button interrupt both require a headset with a microphone.
    pub const fn is_consistent(&self) -> bool {
        let mic = matches!(self.detection, DetectionState::HeadsetWithMic);
        (mic || !self.button.is_pressed()) && (mic || !self.button_irq_enabled)
    }
}
