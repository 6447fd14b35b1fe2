//! Detector driver: owns the state machine, the deferred queue and the
//! capability handles, and applies machine effects to them.
//!
//! The driver is executor agnostic. Interrupt glue calls
//! [`Detector::on_jack_edge`] / [`Detector::on_button_edge`] with the level it
//! sampled, and the worker calls [`Detector::poll`] whenever
//! [`Detector::next_wakeup`] elapses. While an insert is settling the worker
//! runs nothing else, mirroring a task that sleeps inside the work queue.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use crate::config::{ConfigError, DetectorConfig};
use crate::lines::{EventSink, JackLines, LineRole, MicBias, StateQuery, SuspendBlocker};
use crate::machine::{Effect, Effects, Input, JackMachine};
use crate::queue::{DeferredQueue, TaskKind};
use crate::state::{DetectionState, JackState};
use crate::telemetry::{TelemetryInstant, TelemetryRecorder};

/// Failure while attaching the detector.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttachError {
    /// The configuration failed validation.
    Config(ConfigError),
    /// `attach` called on a detector that is already running.
    AlreadyAttached,
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::Config(err) => write!(f, "invalid configuration: {err}"),
            AttachError::AlreadyAttached => f.write_str("detector already attached"),
        }
    }
}

impl From<ConfigError> for AttachError {
    fn from(err: ConfigError) -> Self {
        AttachError::Config(err)
    }
}

/// Bundle of the outward-facing capabilities the detector drives.
pub struct Capabilities<L, B, S, W> {
    pub lines: L,
    pub bias: B,
    pub sink: S,
    pub suspend: W,
}

/// Headset detector instance.
pub struct Detector<Instant, L, B, S, W>
where
    Instant: Copy,
{
    machine: JackMachine,
    queue: DeferredQueue<Instant>,
    settle_until: Option<Instant>,
    attached: bool,
    lines: L,
    bias: B,
    sink: S,
    suspend: W,
    telemetry: TelemetryRecorder<Instant>,
}

impl<Instant, L, B, S, W> Detector<Instant, L, B, S, W>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant> + TelemetryInstant,
    L: JackLines,
    B: MicBias,
    S: EventSink,
    W: SuspendBlocker,
{
    /// Validates `config` and binds the capabilities. Nothing is touched until
    /// [`Detector::attach`].
    pub fn new(
        config: DetectorConfig,
        capabilities: Capabilities<L, B, S, W>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let Capabilities {
            lines,
            bias,
            sink,
            suspend,
        } = capabilities;

        Ok(Self {
            machine: JackMachine::new(config),
            queue: DeferredQueue::new(),
            settle_until: None,
            attached: false,
            lines,
            bias,
            sink,
            suspend,
            telemetry: TelemetryRecorder::new(),
        })
    }

    /// Builds and attaches in one step.
    pub fn attach_new(
        config: DetectorConfig,
        capabilities: Capabilities<L, B, S, W>,
        now: Instant,
    ) -> Result<Self, AttachError> {
        let mut detector = Self::new(config, capabilities)?;
        detector.attach(now)?;
        Ok(detector)
    }

    /// Parks the outputs in a known state and probes the detect line. A plug
    /// already present is classified on the next [`Detector::poll`].
    pub fn attach(&mut self, now: Instant) -> Result<(), AttachError> {
        if self.attached {
            return Err(AttachError::AlreadyAttached);
        }
        self.attached = true;

        let detect = self.lines.read(LineRole::Detect);
        let effects = self.machine.handle(Input::Attach { detect });
        self.apply(&effects, now);
        Ok(())
    }

    /// Tears the detector down, reporting a removal if a headset was present.
    pub fn detach(&mut self, now: Instant) {
        if !self.attached {
            return;
        }
        let effects = self.machine.handle(Input::Detach);
        self.apply(&effects, now);
        self.settle_until = None;
        self.queue.clear();
        self.attached = false;
    }

    /// Detect-line interrupt: `detect` is the level sampled in the handler.
    pub fn on_jack_edge(&mut self, detect: crate::lines::Level, now: Instant) {
        if !self.attached {
            return;
        }
        let effects = self.machine.handle(Input::JackEdge { detect });
        self.apply(&effects, now);
    }

    /// Button-line interrupt: `button` is the level sampled in the handler.
    pub fn on_button_edge(&mut self, button: crate::lines::Level, now: Instant) {
        if !self.attached {
            return;
        }
        let effects = self.machine.handle(Input::ButtonEdge { button });
        self.apply(&effects, now);
    }

    /// Runs every piece of deferred work that is due at `now`.
    ///
    /// Returns the number of steps executed (task entries plus settle
    /// completions).
    pub fn poll(&mut self, now: Instant) -> usize {
        let mut steps = 0;
        loop {
            if let Some(until) = self.settle_until {
                if now < until {
                    break;
                }
                self.settle_until = None;
                let pole = self.lines.read(LineRole::PoleType);
                let effects = self.machine.handle(Input::Settled { pole });
                self.apply(&effects, now);
                steps += 1;
                continue;
            }

            let Some(task) = self.queue.pop_due(now) else {
                break;
            };
            self.run_task(task, now);
            steps += 1;
        }
        steps
    }

    /// Advances through every wakeup up to and including `target`, running
    /// each step at its own deadline. Host simulations use this to replay a
    /// span of virtual time deterministically.
    pub fn run_until(&mut self, target: Instant) -> usize {
        let mut steps = 0;
        while let Some(wakeup) = self.next_wakeup() {
            if wakeup > target {
                break;
            }
            steps += self.poll(wakeup);
        }
        steps + self.poll(target)
    }

    /// Instant the worker next has something to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.settle_until.or_else(|| self.queue.next_deadline())
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_settling(&self) -> bool {
        self.settle_until.is_some()
    }

    pub fn detection(&self) -> DetectionState {
        self.machine.state().detection
    }

    pub fn jack_state(&self) -> JackState {
        self.machine.state()
    }

    pub fn config(&self) -> &DetectorConfig {
        self.machine.config()
    }

    pub fn queue(&self) -> &DeferredQueue<Instant> {
        &self.queue
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<Instant> {
        &self.telemetry
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn bias(&self) -> &B {
        &self.bias
    }

    pub fn suspend(&self) -> &W {
        &self.suspend
    }

    fn run_task(&mut self, task: TaskKind, now: Instant) {
        let detect = self.lines.read(LineRole::Detect);
        let effects = self.machine.handle(Input::Run { task, detect });
        self.apply(&effects, now);
    }

    fn apply(&mut self, effects: &Effects, now: Instant) {
        for effect in effects {
            match *effect {
                Effect::HoldAwake(window) => self.suspend.hold(window),
                Effect::Schedule { task, delay } => {
                    self.queue.schedule(task, now, delay);
                }
                Effect::Cancel(task) => {
                    self.queue.cancel(task);
                }
                Effect::MicBias(enabled) => self.bias.set(enabled),
                Effect::MicEnable(enabled) => self.lines.set_mic_enable(enabled),
                Effect::ButtonIrq(enabled) => {
                    self.lines.set_button_irq(enabled);
                    self.telemetry.record_gate(enabled, now);
                }
                Effect::Settle(delay) => self.settle_until = Some(now + delay),
                Effect::Switch(switch, active) => self.sink.report_switch(switch, active),
                Effect::Key { code, pressed } => {
                    self.sink.report_key(code, pressed);
                    self.telemetry.record_key(pressed, now);
                }
                Effect::Sync => self.sink.sync(),
                Effect::Transition { to, pole, .. } => {
                    if to.is_present() {
                        self.telemetry.record_inserted(pole, now);
                    } else {
                        self.telemetry.record_removed(now);
                    }
                }
                Effect::Ignored(reason) => {
                    self.telemetry.record_ignored(reason, now);
                }
            }
        }
    }
}

impl<Instant, L, B, S, W> StateQuery for Detector<Instant, L, B, S, W>
where
    Instant: Copy,
{
    fn name(&self) -> &str {
        self.machine.config().switch_name
    }

    fn state(&self) -> u8 {
        self.machine.state().detection.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KEY_MEDIA, LineMap};
    use crate::lines::{Level, LineId, NoMicBias, NoSuspendBlock, SwitchKind};

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct Ms(u64);

    impl Add<Duration> for Ms {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + rhs.as_millis() as u64)
        }
    }

    impl TelemetryInstant for Ms {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[derive(Default)]
    struct Lines {
        detect: Option<Level>,
        pole: Option<Level>,
        mic_enable: bool,
        button_irq: bool,
    }

    impl JackLines for Lines {
        fn read(&mut self, line: LineRole) -> Level {
            match line {
                LineRole::Detect => self.detect.unwrap_or(Level::High),
                LineRole::PoleType => self.pole.unwrap_or(Level::High),
                LineRole::Button | LineRole::MicEnable => Level::Low,
            }
        }

        fn set_mic_enable(&mut self, enabled: bool) {
            self.mic_enable = enabled;
        }

        fn set_button_irq(&mut self, enabled: bool) {
            self.button_irq = enabled;
        }
    }

    #[derive(Default)]
    struct Count {
        switches: usize,
        syncs: usize,
    }

    impl EventSink for Count {
        fn report_switch(&mut self, _: SwitchKind, _: bool) {
            self.switches += 1;
        }

        fn report_key(&mut self, _: u16, _: bool) {}

        fn sync(&mut self) {
            self.syncs += 1;
        }
    }

    type TestDetector = Detector<Ms, Lines, NoMicBias, Count, NoSuspendBlock>;

    fn detector(lines: Lines) -> TestDetector {
        let map = LineMap::new(LineId(1), LineId(2), LineId(3), LineId(4));
        Detector::new(
            DetectorConfig::new(map, KEY_MEDIA),
            Capabilities {
                lines,
                bias: NoMicBias,
                sink: Count::default(),
                suspend: NoSuspendBlock,
            },
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let map = LineMap::new(LineId(1), LineId(1), LineId(3), LineId(4));
        let result = TestDetector::new(
            DetectorConfig::new(map, KEY_MEDIA),
            Capabilities {
                lines: Lines::default(),
                bias: NoMicBias,
                sink: Count::default(),
                suspend: NoSuspendBlock,
            },
        );
        assert!(matches!(result, Err(ConfigError::SharedLine { .. })));
    }

    #[test]
    fn second_attach_fails() {
        let mut detector = detector(Lines::default());
        detector.attach(Ms(0)).unwrap();
        assert_eq!(detector.attach(Ms(1)), Err(AttachError::AlreadyAttached));
    }

    #[test]
    fn settle_blocks_other_tasks() {
        let mut detector = detector(Lines {
            detect: Some(Level::Low),
            pole: Some(Level::Low),
            ..Lines::default()
        });
        detector.attach(Ms(0)).unwrap();

        assert_eq!(detector.poll(Ms(0)), 1);
        assert!(detector.is_settling());
        assert_eq!(detector.next_wakeup(), Some(Ms(10)));
        assert!(detector.lines().mic_enable);

        assert_eq!(detector.poll(Ms(5)), 0);
        assert_eq!(detector.poll(Ms(10)), 1);
        assert_eq!(detector.detection(), DetectionState::HeadsetWithMic);
        assert_eq!(detector.next_wakeup(), Some(Ms(610)));
        assert_eq!(detector.sink().switches, 2);
        assert_eq!(detector.sink().syncs, 2);
    }

    #[test]
    fn state_query_reports_name_and_code() {
        let mut detector = detector(Lines {
            detect: Some(Level::Low),
            pole: Some(Level::High),
            ..Lines::default()
        });
        detector.attach(Ms(0)).unwrap();
        detector.run_until(Ms(100));

        assert_eq!(detector.name(), "h2w");
        assert_eq!(StateQuery::state(&detector), 2);
    }

    #[test]
    fn edges_before_attach_are_dropped() {
        let mut detector = detector(Lines::default());
        detector.on_jack_edge(Level::Low, Ms(0));
        assert!(detector.queue().is_empty());
    }
}
