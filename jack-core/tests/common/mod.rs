#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use jack_core::config::{KEY_MEDIA, LineMap};
use jack_core::lines::{LineId, SwitchKind};
use jack_core::telemetry::TelemetryInstant;
use jack_core::{
    Capabilities, Detector, DetectorConfig, EventSink, JackLines, Level, LineRole, MicBias,
    PoleType, SuspendBlocker,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub u64);

impl MockInstant {
    pub fn millis(value: u64) -> Self {
        Self(value)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_millis() as u64)
    }
}

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// Simulated jack switch. Idle levels: detect high, pole high, button low.
#[derive(Debug)]
pub struct SimLines {
    pub detect: Level,
    pub pole: Level,
    pub button: Level,
    pub mic_enable: bool,
    pub button_irq: bool,
}

impl Default for SimLines {
    fn default() -> Self {
        Self {
            detect: Level::High,
            pole: Level::High,
            button: Level::Low,
            mic_enable: false,
            button_irq: false,
        }
    }
}

impl JackLines for SimLines {
    fn read(&mut self, line: LineRole) -> Level {
        match line {
            LineRole::Detect => self.detect,
            LineRole::PoleType => self.pole,
            LineRole::Button => self.button,
            LineRole::MicEnable => {
                if self.mic_enable {
                    Level::High
                } else {
                    Level::Low
                }
            }
        }
    }

    fn set_mic_enable(&mut self, enabled: bool) {
        self.mic_enable = enabled;
    }

    fn set_button_irq(&mut self, enabled: bool) {
        self.button_irq = enabled;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Report {
    Switch(SwitchKind, bool),
    Key(u16, bool),
    Sync,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub reports: Vec<Report>,
}

impl RecordingSink {
    pub fn keys(&self) -> Vec<bool> {
        self.reports
            .iter()
            .filter_map(|report| match report {
                Report::Key(_, pressed) => Some(*pressed),
                _ => None,
            })
            .collect()
    }

    pub fn switches(&self, kind: SwitchKind) -> Vec<bool> {
        self.reports
            .iter()
            .filter_map(|report| match report {
                Report::Switch(switch, active) if *switch == kind => Some(*active),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn report_switch(&mut self, switch: SwitchKind, active: bool) {
        self.reports.push(Report::Switch(switch, active));
    }

    fn report_key(&mut self, code: u16, pressed: bool) {
        self.reports.push(Report::Key(code, pressed));
    }

    fn sync(&mut self) {
        self.reports.push(Report::Sync);
    }
}

#[derive(Clone, Debug, Default)]
pub struct SharedBias(pub Rc<RefCell<Vec<bool>>>);

impl MicBias for SharedBias {
    fn set(&mut self, enabled: bool) {
        self.0.borrow_mut().push(enabled);
    }
}

#[derive(Debug, Default)]
pub struct CountingSuspend {
    pub holds: usize,
}

impl SuspendBlocker for CountingSuspend {
    fn hold(&mut self, window: Duration) {
        assert_eq!(window, Duration::from_secs(2));
        self.holds += 1;
    }
}

pub type BenchDetector = Detector<MockInstant, SimLines, SharedBias, RecordingSink, CountingSuspend>;

pub const LINES: LineMap = LineMap::new(LineId(26), LineId(29), LineId(41), LineId(127));

/// Detector wired to simulated lines with a virtual clock.
pub struct Bench {
    pub detector: BenchDetector,
    pub now: MockInstant,
    pub bias: Rc<RefCell<Vec<bool>>>,
}

impl Bench {
    pub fn new() -> Self {
        Self::with_lines(SimLines::default())
    }

    /// Attaches with a plug already seated.
    pub fn plugged_at_boot(pole: PoleType) -> Self {
        Self::with_lines(SimLines {
            detect: Level::Low,
            pole: pole.level(),
            ..SimLines::default()
        })
    }

    fn with_lines(lines: SimLines) -> Self {
        let bias = SharedBias::default();
        let log = Rc::clone(&bias.0);
        let detector = Detector::attach_new(
            DetectorConfig::new(LINES, KEY_MEDIA),
            Capabilities {
                lines,
                bias,
                sink: RecordingSink::default(),
                suspend: CountingSuspend::default(),
            },
            MockInstant::millis(0),
        )
        .expect("bench config is valid");

        Self {
            detector,
            now: MockInstant::millis(0),
            bias: log,
        }
    }

    pub fn plug(&mut self, pole: PoleType) {
        let lines = self.detector.lines_mut();
        lines.pole = pole.level();
        lines.detect = Level::Low;
        self.detector.on_jack_edge(Level::Low, self.now);
    }

    pub fn unplug(&mut self) {
        let lines = self.detector.lines_mut();
        lines.detect = Level::High;
        lines.pole = Level::High;
        lines.button = Level::Low;
        self.detector.on_jack_edge(Level::High, self.now);
    }

    pub fn press(&mut self) {
        self.drive_button(Level::High);
    }

    pub fn release(&mut self) {
        self.drive_button(Level::Low);
    }

    fn drive_button(&mut self, level: Level) {
        let lines = self.detector.lines_mut();
        lines.button = level;
        // A masked interrupt never reaches the handler.
        if lines.button_irq {
            self.detector.on_button_edge(level, self.now);
        }
    }

    pub fn advance(&mut self, millis: u64) {
        let target = MockInstant::millis(self.now.0 + millis);
        self.detector.run_until(target);
        self.now = target;
    }

    pub fn reports(&self) -> &[Report] {
        &self.detector.sink().reports
    }

    pub fn sink(&self) -> &RecordingSink {
        self.detector.sink()
    }

    pub fn bias_log(&self) -> Vec<bool> {
        self.bias.borrow().clone()
    }
}
