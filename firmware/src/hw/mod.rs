#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Board wiring for the headset switch.
//!
//! | Role      | Pin | EXTI  | Notes                          |
//! |-----------|-----|-------|--------------------------------|
//! | detect    | PA0 | EXTI0 | low while a plug is seated     |
//! | key       | PA1 | EXTI1 | high while send/end is pressed |
//! | jpole     | PA6 | -     | high for three-pole plugs      |
//! | mic-en    | PA7 | -     | push-pull output               |
//! | mic bias  | PB3 | -     | LDO enable for the mic bias    |

use core::time::Duration;

use jack_core::config::{KEY_MEDIA, LineMap};
use jack_core::lines::LineId;
use jack_core::DetectorConfig;

/// GPIO numbers (`port * 16 + pin`) of the jack lines.
pub const BOARD_LINES: LineMap = LineMap::new(LineId(0), LineId(6), LineId(1), LineId(7));

/// Bit index within GPIOA's input data register for a line on port A.
pub const fn port_a_pin(line: LineId) -> usize {
    (line.0 % 16) as usize
}

const DETECT_PIN: usize = port_a_pin(BOARD_LINES.detect);
const KEY_PIN: usize = port_a_pin(BOARD_LINES.button);

/// The bias LDO on this board needs a little longer than the default to settle.
pub const BOARD_SETTLE_DELAY: Duration = Duration::from_millis(15);

pub const fn board_config() -> DetectorConfig {
    DetectorConfig::new(BOARD_LINES, KEY_MEDIA).with_settle_delay(BOARD_SETTLE_DELAY)
}

#[cfg(target_os = "none")]
pub use target::{BoardLines, MicBiasPin, WakeWindow};

#[cfg(target_os = "none")]
mod target {
    use embassy_stm32::gpio::{Input, Output};
    use embassy_stm32::pac::{self, gpio::vals::Idr};
    use jack_core::{JackLines, Level, LineRole, MicBias, SuspendBlocker};

    use crate::jack::FirmwareInstant;
    use super::{DETECT_PIN, KEY_PIN};
    use crate::status;

    /// Jack lines owned by the worker. The interrupt-capable pins are owned by
    /// their EXTI tasks, so detect and key are sampled straight from `IDR`.
    pub struct BoardLines {
        pole: Input<'static>,
        mic_enable: Output<'static>,
    }

    impl BoardLines {
        pub fn new(pole: Input<'static>, mic_enable: Output<'static>) -> Self {
            Self { pole, mic_enable }
        }
    }

    impl JackLines for BoardLines {
        fn read(&mut self, line: LineRole) -> Level {
            match line {
                LineRole::Detect => sample_port_a(DETECT_PIN),
                LineRole::Button => sample_port_a(KEY_PIN),
                LineRole::PoleType => {
                    if self.pole.is_high() {
                        Level::High
                    } else {
                        Level::Low
                    }
                }
                LineRole::MicEnable => {
                    if self.mic_enable.is_set_high() {
                        Level::High
                    } else {
                        Level::Low
                    }
                }
            }
        }

        fn set_mic_enable(&mut self, enabled: bool) {
            if enabled {
                self.mic_enable.set_high();
            } else {
                self.mic_enable.set_low();
            }
        }

        fn set_button_irq(&mut self, enabled: bool) {
            status::set_button_irq_enabled(enabled);
        }
    }

    fn sample_port_a(pin: usize) -> Level {
        if pac::GPIOA.idr().read().idr(pin) == Idr::HIGH {
            Level::High
        } else {
            Level::Low
        }
    }

    pub struct MicBiasPin(Output<'static>);

    impl MicBiasPin {
        pub fn new(pin: Output<'static>) -> Self {
            Self(pin)
        }
    }

    impl MicBias for MicBiasPin {
        fn set(&mut self, enabled: bool) {
            if enabled {
                self.0.set_high();
            } else {
                self.0.set_low();
            }
        }
    }

    /// Suspend blocker backed by the shared wake deadline.
    #[derive(Copy, Clone, Debug, Default)]
    pub struct WakeWindow;

    impl SuspendBlocker for WakeWindow {
        fn hold(&mut self, window: core::time::Duration) {
            let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
            status::hold_awake_until(FirmwareInstant::now().as_millis().saturating_add(window_ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_config_is_valid() {
        let config = board_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.settle_delay, BOARD_SETTLE_DELAY);
        assert_eq!(config.switch_name, "h2w");
    }

    #[test]
    fn edge_lines_sample_their_own_idr_bits() {
        assert_eq!(DETECT_PIN, 0);
        assert_eq!(KEY_PIN, 1);
        assert_eq!(port_a_pin(LineId(17)), 1);
    }
}
