//! Capability interfaces for the jack hardware lines and the outward channels.
//!
//! The detection logic never touches a concrete GPIO or input subsystem. It
//! depends on the narrow traits below so the same machine runs against the
//! STM32 EXTI lines on target and against simulated lines in the emulator and
//! host tests.

use core::fmt;
use core::time::Duration;

/// Digital level sampled from a line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Builds a level from a raw GPIO value (0 == low).
    pub const fn from_raw(value: u8) -> Self {
        if value == 0 { Level::Low } else { Level::High }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    pub const fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

/// Logical role of each line wired to the jack switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineRole {
    /// Jack insertion detect (input, both-edge interrupt).
    Detect,
    /// Three/four-pole classification (input, sampled after settling).
    PoleType,
    /// Send/end button (input, both-edge interrupt).
    Button,
    /// Microphone enable (output).
    MicEnable,
}

impl LineRole {
    pub const ALL: [LineRole; 4] = [
        LineRole::Detect,
        LineRole::PoleType,
        LineRole::Button,
        LineRole::MicEnable,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LineRole::Detect => "detect",
            LineRole::PoleType => "jpole",
            LineRole::Button => "key",
            LineRole::MicEnable => "mic-en",
        }
    }

    /// Returns `true` for the lines that raise interrupts.
    pub const fn has_interrupt(self) -> bool {
        matches!(self, LineRole::Detect | LineRole::Button)
    }
}

impl fmt::Display for LineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Platform identifier for a line (GPIO number, EXTI channel, ...).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct LineId(pub u16);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}

/// Physical state of the jack as seen on the detect line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JackPresence {
    Inserted,
    Removed,
}

impl JackPresence {
    /// Detect is pulled high by the switch when nothing is plugged in.
    pub const fn from_level(level: Level) -> Self {
        match level {
            Level::Low => JackPresence::Inserted,
            Level::High => JackPresence::Removed,
        }
    }

    pub const fn level(self) -> Level {
        match self {
            JackPresence::Inserted => Level::Low,
            JackPresence::Removed => Level::High,
        }
    }
}

/// Physical state of the button line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonLevel {
    Pressed,
    Released,
}

impl ButtonLevel {
    pub const fn from_level(level: Level) -> Self {
        match level {
            Level::High => ButtonLevel::Pressed,
            Level::Low => ButtonLevel::Released,
        }
    }

    pub const fn level(self) -> Level {
        match self {
            ButtonLevel::Pressed => Level::High,
            ButtonLevel::Released => Level::Low,
        }
    }
}

/// Read/write access to the jack lines plus the button interrupt gate.
pub trait JackLines {
    /// Samples the current level of an input line.
    fn read(&mut self, line: LineRole) -> Level;

    /// Drives the microphone enable output.
    fn set_mic_enable(&mut self, enabled: bool);

    /// Unmasks or masks the button interrupt.
    fn set_button_irq(&mut self, enabled: bool);
}

/// Board callback that switches the headset microphone bias supply.
///
/// Fire-and-forget: failures are not reported back.
pub trait MicBias {
    fn set(&mut self, enabled: bool);
}

impl<F> MicBias for F
where
    F: FnMut(bool),
{
    fn set(&mut self, enabled: bool) {
        self(enabled);
    }
}

/// Mic bias callback for boards without a controllable supply.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoMicBias;

impl MicBias for NoMicBias {
    fn set(&mut self, _: bool) {}
}

/// Switch codes forwarded to the input subsystem.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SwitchKind {
    HeadphoneInsert,
    MicrophoneInsert,
}

impl SwitchKind {
    pub const fn label(self) -> &'static str {
        match self {
            SwitchKind::HeadphoneInsert => "SW_HEADPHONE_INSERT",
            SwitchKind::MicrophoneInsert => "SW_MICROPHONE_INSERT",
        }
    }
}

/// Consumer of switch and key notifications.
///
/// Every batch of reports is terminated by [`EventSink::sync`] so consumers
/// observe atomic snapshots.
pub trait EventSink {
    fn report_switch(&mut self, switch: SwitchKind, active: bool);

    fn report_key(&mut self, code: u16, pressed: bool);

    fn sync(&mut self);
}

/// Platform facility that keeps the system awake for a bounded window.
pub trait SuspendBlocker {
    /// Prevents suspend for at least `window` from now. Never released explicitly.
    fn hold(&mut self, window: Duration);
}

/// Suspend blocker for platforms without power management.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSuspendBlock;

impl SuspendBlocker for NoSuspendBlock {
    fn hold(&mut self, _: Duration) {}
}

/// Read-only query surface published to the rest of the platform.
pub trait StateQuery {
    /// Fixed device name.
    fn name(&self) -> &str;

    /// Raw state code: 0 = no device, 1 = headset with mic, 2 = headset without mic.
    fn state(&self) -> u8;
}
