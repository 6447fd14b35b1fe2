//! Immutable detector configuration.
//!
//! Board code builds a [`DetectorConfig`] once at attach time. Timing values
//! that the board cannot override (detect debounce, button-enable guard) live
//! here as constants so firmware and emulator agree on them.

use core::fmt;
use core::time::Duration;

use crate::lines::{LineId, LineRole};

/// Debounce applied to detect-line edges before the insert/remove task runs.
pub const DETECT_DEBOUNCE: Duration = Duration::from_millis(20);

/// Delay between a four-pole insertion and unmasking the button interrupt.
pub const BUTTON_ENABLE_GUARD: Duration = Duration::from_millis(600);

/// Default time a button level must persist before a press is reported.
pub const DEFAULT_PRESS_CONFIRM: Duration = Duration::from_millis(200);

/// Default time a button level must persist before a release is reported.
pub const DEFAULT_RELEASE_CONFIRM: Duration = Duration::from_millis(200);

/// Default pole-line settle delay after enabling the mic bias.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(10);

/// Window each interrupt keeps the system out of suspend.
pub const SUSPEND_BLOCK_WINDOW: Duration = Duration::from_secs(2);

/// `KEY_MEDIA` in the Linux input code table.
pub const KEY_MEDIA: u16 = 226;

/// Name published through the state query interface.
pub const DEFAULT_SWITCH_NAME: &str = "h2w";

/// Name of the keypad input device carrying switch and key events.
pub const DEFAULT_KEYPAD_NAME: &str = "hs_detect";

/// Line assignments for the four jack lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineMap {
    pub detect: LineId,
    pub pole_type: LineId,
    pub button: LineId,
    pub mic_enable: LineId,
}

impl LineMap {
    pub const fn new(detect: LineId, pole_type: LineId, button: LineId, mic_enable: LineId) -> Self {
        Self {
            detect,
            pole_type,
            button,
            mic_enable,
        }
    }

    /// Returns the identifier wired to `role`.
    pub const fn get(&self, role: LineRole) -> LineId {
        match role {
            LineRole::Detect => self.detect,
            LineRole::PoleType => self.pole_type,
            LineRole::Button => self.button,
            LineRole::MicEnable => self.mic_enable,
        }
    }
}

/// Configuration rejected by [`DetectorConfig::validate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Two roles were assigned the same line.
    SharedLine {
        first: LineRole,
        second: LineRole,
        line: LineId,
    },
    /// A confirm delay of zero disables button debouncing.
    ZeroConfirmDelay(LineRole),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SharedLine {
                first,
                second,
                line,
            } => write!(f, "{first} and {second} both use {line}"),
            ConfigError::ZeroConfirmDelay(role) => {
                write!(f, "{role} confirm delay must be non-zero")
            }
        }
    }
}

/// Everything the detector needs besides its capability handles.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DetectorConfig {
    pub lines: LineMap,
    pub key_code: u16,
    pub settle_delay: Duration,
    pub press_confirm: Duration,
    pub release_confirm: Duration,
    pub switch_name: &'static str,
    pub keypad_name: &'static str,
}

impl DetectorConfig {
    /// Builds a configuration with the default delays and names.
    pub const fn new(lines: LineMap, key_code: u16) -> Self {
        Self {
            lines,
            key_code,
            settle_delay: DEFAULT_SETTLE_DELAY,
            press_confirm: DEFAULT_PRESS_CONFIRM,
            release_confirm: DEFAULT_RELEASE_CONFIRM,
            switch_name: DEFAULT_SWITCH_NAME,
            keypad_name: DEFAULT_KEYPAD_NAME,
        }
    }

    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_confirm_delays(mut self, press: Duration, release: Duration) -> Self {
        self.press_confirm = press;
        self.release_confirm = release;
        self
    }

    #[must_use]
    pub const fn with_names(mut self, switch_name: &'static str, keypad_name: &'static str) -> Self {
        self.switch_name = switch_name;
        self.keypad_name = keypad_name;
        self
    }

    /// Debounce applied to detect-line edges.
    pub const fn detect_debounce(&self) -> Duration {
        DETECT_DEBOUNCE
    }

    /// Guard before the button interrupt is unmasked after a four-pole insert.
    pub const fn button_enable_guard(&self) -> Duration {
        BUTTON_ENABLE_GUARD
    }

    /// Checks the configuration for wiring mistakes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, first) in LineRole::ALL.iter().enumerate() {
            for second in &LineRole::ALL[index + 1..] {
                let line = self.lines.get(*first);
                if line == self.lines.get(*second) {
                    return Err(ConfigError::SharedLine {
                        first: *first,
                        second: *second,
                        line,
                    });
                }
            }
        }

        if self.press_confirm.is_zero() || self.release_confirm.is_zero() {
            return Err(ConfigError::ZeroConfirmDelay(LineRole::Button));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINES: LineMap = LineMap::new(LineId(26), LineId(29), LineId(41), LineId(127));

    #[test]
    fn defaults_follow_board_timings() {
        let config = DetectorConfig::new(LINES, KEY_MEDIA);
        assert_eq!(config.press_confirm, Duration::from_millis(200));
        assert_eq!(config.release_confirm, Duration::from_millis(200));
        assert_eq!(config.detect_debounce(), Duration::from_millis(20));
        assert_eq!(config.button_enable_guard(), Duration::from_millis(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn shared_lines_are_rejected() {
        let lines = LineMap::new(LineId(26), LineId(29), LineId(26), LineId(127));
        let config = DetectorConfig::new(lines, KEY_MEDIA);
        assert_eq!(
            config.validate(),
            Err(ConfigError::SharedLine {
                first: LineRole::Detect,
                second: LineRole::Button,
                line: LineId(26),
            })
        );
    }

    #[test]
    fn zero_confirm_delay_is_rejected() {
        let config = DetectorConfig::new(LINES, KEY_MEDIA)
            .with_confirm_delays(Duration::ZERO, Duration::from_millis(200));
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroConfirmDelay(LineRole::Button))
        );
    }
}
