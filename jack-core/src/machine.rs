//! Pure jack detection and button state machine.
//!
//! [`JackMachine::handle`] consumes one [`Input`] (an edge seen by an interrupt
//! handler, or a deferred task running on the worker together with the line
//! levels it sampled) and returns the [`Effects`] the caller must apply in
//! order. The machine never touches hardware, never sleeps and never reads a
//! clock, which keeps every transition unit-testable.
//!
//! ```text
//!   detect edge ──► Cancel(other) + Schedule(insert|remove, 20 ms)
//!   button edge ──► Schedule(press|release, confirm delay)   [gate open only]
//!
//!   Run(insert)  ──► MicBias(on) MicEnable(on) Settle(delay)
//!   Settled      ──► 3-pole: MicBias(off) ... HeadsetNoMic, HP=1, Sync
//!                    4-pole: Schedule(button-enable, 600 ms) HeadsetWithMic,
//!                            HP=1, Sync, MIC=1, Sync
//!   Run(remove)  ──► [KEY=0 Sync] NoDevice, Cancel(button tasks) MicEnable(off)
//!                    MicBias(off) [ButtonIrq(off)] HP=0 [MIC=0] Sync
//! ```

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::config::{DetectorConfig, SUSPEND_BLOCK_WINDOW};
use crate::lines::{ButtonLevel, JackPresence, Level, SwitchKind};
use crate::queue::TaskKind;
use crate::state::{ButtonState, DetectionState, JackState, PoleType};

/// Upper bound on effects produced by a single input (detach is the largest).
pub const MAX_EFFECTS: usize = 20;

/// Ordered effects returned by [`JackMachine::handle`].
pub type Effects = Vec<Effect, MAX_EFFECTS>;

/// Stimulus fed to the machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Input {
    /// Detector attached; `detect` is the level sampled during probe.
    Attach { detect: Level },
    /// Either edge on the detect line (interrupt context).
    JackEdge { detect: Level },
    /// Either edge on the button line (interrupt context).
    ButtonEdge { button: Level },
    /// A deferred task started on the worker; `detect` was sampled at entry.
    Run { task: TaskKind, detect: Level },
    /// The insert settle delay elapsed; `pole` was sampled afterwards.
    Settled { pole: Level },
    /// Detector is being torn down.
    Detach,
}

/// Why an input produced no state change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IgnoreReason {
    /// Insert task found the detect line reporting removal.
    FakeInsert,
    /// Remove task found the detect line reporting insertion.
    FakeRemove,
    /// Insert task ran while an accessory is already classified.
    AlreadyPresent,
    /// Remove task ran while nothing is classified.
    AlreadyAbsent,
    /// A settle completion arrived with no insert in progress.
    NotSettling,
    /// Button-enable task found no four-pole headset.
    NoMicrophone,
    /// Button-enable task found the interrupt already unmasked.
    ButtonAlreadyEnabled,
    /// Button confirm task found the jack gone or without a microphone.
    JackRemoved,
    /// Press confirm while already pressed.
    AlreadyPressed,
    /// Release confirm while already released.
    AlreadyReleased,
    /// Button edge or confirm while the button interrupt is masked.
    ButtonMasked,
}

impl IgnoreReason {
    pub const fn label(self) -> &'static str {
        match self {
            IgnoreReason::FakeInsert => "fake-insert",
            IgnoreReason::FakeRemove => "fake-remove",
            IgnoreReason::AlreadyPresent => "already-present",
            IgnoreReason::AlreadyAbsent => "already-absent",
            IgnoreReason::NotSettling => "not-settling",
            IgnoreReason::NoMicrophone => "no-microphone",
            IgnoreReason::ButtonAlreadyEnabled => "button-already-enabled",
            IgnoreReason::JackRemoved => "jack-removed",
            IgnoreReason::AlreadyPressed => "already-pressed",
            IgnoreReason::AlreadyReleased => "already-released",
            IgnoreReason::ButtonMasked => "button-masked",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Side effect requested by the machine, applied by the caller in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    /// Keep the system out of suspend for the window.
    HoldAwake(Duration),
    /// Replace any pending instance of `task` with one due after `delay`.
    Schedule { task: TaskKind, delay: Duration },
    /// Drop the pending instance of the task, if any.
    Cancel(TaskKind),
    /// Invoke the board mic-bias callback.
    MicBias(bool),
    /// Drive the mic-enable output.
    MicEnable(bool),
    /// Unmask or mask the button interrupt.
    ButtonIrq(bool),
    /// Block the worker for the delay, then feed [`Input::Settled`].
    Settle(Duration),
    /// Report a switch change.
    Switch(SwitchKind, bool),
    /// Report the configured key.
    Key { code: u16, pressed: bool },
    /// Flush the batch of reports.
    Sync,
    /// The detection state changed.
    Transition {
        from: DetectionState,
        to: DetectionState,
        pole: PoleType,
    },
    /// The input was stale or redundant; nothing changed.
    Ignored(IgnoreReason),
}

/// Detection and button state machine.
#[derive(Clone, Debug)]
pub struct JackMachine {
    config: DetectorConfig,
    state: JackState,
    settling: bool,
}

impl JackMachine {
    pub const fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: JackState::new(),
            settling: false,
        }
    }

    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub const fn state(&self) -> JackState {
        self.state
    }

    /// Returns `true` between an insert task's entry and its settle completion.
    pub const fn is_settling(&self) -> bool {
        self.settling
    }

    /// Applies one input and returns the effects to carry out.
    pub fn handle(&mut self, input: Input) -> Effects {
        let mut out = Effects::new();
        match input {
            Input::Attach { detect } => self.attach(detect, &mut out),
            Input::JackEdge { detect } => self.jack_edge(detect, &mut out),
            Input::ButtonEdge { button } => self.button_edge(button, &mut out),
            Input::Run { task, detect } => {
                let presence = JackPresence::from_level(detect);
                match task {
                    TaskKind::Insert => self.begin_insert(presence, &mut out),
                    TaskKind::Remove => self.remove(presence, &mut out),
                    TaskKind::ButtonEnable => self.enable_button(presence, &mut out),
                    TaskKind::ButtonPress => {
                        self.confirm_button(ButtonState::Pressed, presence, &mut out);
                    }
                    TaskKind::ButtonRelease => {
                        self.confirm_button(ButtonState::Released, presence, &mut out);
                    }
                }
            }
            Input::Settled { pole } => self.finish_insert(pole, &mut out),
            Input::Detach => self.detach(&mut out),
        }
        debug_assert!(self.state.is_consistent(), "jack state invariant broken");
        out
    }

    fn attach(&mut self, detect: Level, out: &mut Effects) {
        emit(out, Effect::MicEnable(false));
        emit(out, Effect::ButtonIrq(false));
        self.state.button_irq_enabled = false;

        if JackPresence::from_level(detect) == JackPresence::Inserted {
            emit(
                out,
                Effect::Schedule {
                    task: TaskKind::Insert,
                    delay: Duration::ZERO,
                },
            );
        }
    }

    fn jack_edge(&mut self, detect: Level, out: &mut Effects) {
        emit(out, Effect::HoldAwake(SUSPEND_BLOCK_WINDOW));

        let task = match JackPresence::from_level(detect) {
            JackPresence::Removed => TaskKind::Remove,
            JackPresence::Inserted => TaskKind::Insert,
        };
        if let Some(stale) = task.supersedes() {
            emit(out, Effect::Cancel(stale));
        }
        emit(
            out,
            Effect::Schedule {
                task,
                delay: self.config.detect_debounce(),
            },
        );
    }

    fn button_edge(&mut self, button: Level, out: &mut Effects) {
        if !self.state.button_irq_enabled {
            emit(out, Effect::Ignored(IgnoreReason::ButtonMasked));
            return;
        }

        emit(out, Effect::HoldAwake(SUSPEND_BLOCK_WINDOW));
        let (task, delay) = match ButtonLevel::from_level(button) {
            ButtonLevel::Pressed => (TaskKind::ButtonPress, self.config.press_confirm),
            ButtonLevel::Released => (TaskKind::ButtonRelease, self.config.release_confirm),
        };
        emit(out, Effect::Schedule { task, delay });
    }

    fn begin_insert(&mut self, presence: JackPresence, out: &mut Effects) {
        if presence != JackPresence::Inserted {
            emit(out, Effect::Ignored(IgnoreReason::FakeInsert));
            return;
        }
        if self.state.detection.is_present() {
            emit(out, Effect::Ignored(IgnoreReason::AlreadyPresent));
            return;
        }

        self.settling = true;
        emit(out, Effect::MicBias(true));
        emit(out, Effect::MicEnable(true));
        emit(out, Effect::Settle(self.config.settle_delay));
    }

    /// Commits the classification. Detect is only checked at task entry; a
    /// plug pulled during the settle delay is undone by the queued remove.
    fn finish_insert(&mut self, pole: Level, out: &mut Effects) {
        if !self.settling {
            emit(out, Effect::Ignored(IgnoreReason::NotSettling));
            return;
        }
        self.settling = false;

        let pole = PoleType::from_level(pole);
        self.state.pole = pole;
        match pole {
            PoleType::ThreePole => {
                emit(out, Effect::MicBias(false));
                emit(out, Effect::MicEnable(false));
                self.transition(DetectionState::HeadsetNoMic, out);
                emit(out, Effect::Switch(SwitchKind::HeadphoneInsert, true));
                emit(out, Effect::Sync);
            }
            PoleType::FourPole => {
                emit(
                    out,
                    Effect::Schedule {
                        task: TaskKind::ButtonEnable,
                        delay: self.config.button_enable_guard(),
                    },
                );
                self.transition(DetectionState::HeadsetWithMic, out);
                emit(out, Effect::Switch(SwitchKind::HeadphoneInsert, true));
                emit(out, Effect::Sync);
                emit(out, Effect::Switch(SwitchKind::MicrophoneInsert, true));
                emit(out, Effect::Sync);
            }
        }
    }

    fn remove(&mut self, presence: JackPresence, out: &mut Effects) {
        if presence != JackPresence::Removed {
            emit(out, Effect::Ignored(IgnoreReason::FakeRemove));
            return;
        }
        if !self.state.detection.is_present() {
            emit(out, Effect::Ignored(IgnoreReason::AlreadyAbsent));
            return;
        }
        self.tear_down_headset(out);
    }

    /// Removal body shared by the remove task and detach.
    fn tear_down_headset(&mut self, out: &mut Effects) {
        let had_mic = self.state.detection == DetectionState::HeadsetWithMic;

        if self.state.button.is_pressed() {
            emit(
                out,
                Effect::Key {
                    code: self.config.key_code,
                    pressed: false,
                },
            );
            emit(out, Effect::Sync);
            self.state.button = ButtonState::Released;
        }

        self.transition(DetectionState::NoDevice, out);
        self.state.pole = PoleType::ThreePole;
        // Confirms queued for this plug must not fire against the next one.
        for task in [
            TaskKind::ButtonEnable,
            TaskKind::ButtonPress,
            TaskKind::ButtonRelease,
        ] {
            emit(out, Effect::Cancel(task));
        }
        emit(out, Effect::MicEnable(false));
        emit(out, Effect::MicBias(false));

        if self.state.button_irq_enabled {
            self.state.button_irq_enabled = false;
            emit(out, Effect::ButtonIrq(false));
        }

        emit(out, Effect::Switch(SwitchKind::HeadphoneInsert, false));
        if had_mic {
            emit(out, Effect::Switch(SwitchKind::MicrophoneInsert, false));
        }
        emit(out, Effect::Sync);
    }

    fn enable_button(&mut self, presence: JackPresence, out: &mut Effects) {
        if presence != JackPresence::Inserted
            || self.state.detection != DetectionState::HeadsetWithMic
        {
            emit(out, Effect::Ignored(IgnoreReason::NoMicrophone));
            return;
        }
        if self.state.button_irq_enabled {
            emit(out, Effect::Ignored(IgnoreReason::ButtonAlreadyEnabled));
            return;
        }

        self.state.button_irq_enabled = true;
        self.state.button = ButtonState::Released;
        emit(out, Effect::ButtonIrq(true));
    }

    fn confirm_button(&mut self, target: ButtonState, presence: JackPresence, out: &mut Effects) {
        if presence == JackPresence::Removed
            || self.state.detection != DetectionState::HeadsetWithMic
        {
            emit(out, Effect::Ignored(IgnoreReason::JackRemoved));
            return;
        }
        if !self.state.button_irq_enabled {
            emit(out, Effect::Ignored(IgnoreReason::ButtonMasked));
            return;
        }
        if self.state.button == target {
            let reason = match target {
                ButtonState::Pressed => IgnoreReason::AlreadyPressed,
                ButtonState::Released => IgnoreReason::AlreadyReleased,
            };
            emit(out, Effect::Ignored(reason));
            return;
        }

        self.state.button = target;
        emit(
            out,
            Effect::Key {
                code: self.config.key_code,
                pressed: target.is_pressed(),
            },
        );
        emit(out, Effect::Sync);
    }

    fn detach(&mut self, out: &mut Effects) {
        if self.settling {
            self.settling = false;
            emit(out, Effect::MicBias(false));
            emit(out, Effect::MicEnable(false));
        }
        if self.state.detection.is_present() {
            self.tear_down_headset(out);
        }
        for task in TaskKind::ALL {
            emit(out, Effect::Cancel(task));
        }
    }

    fn transition(&mut self, to: DetectionState, out: &mut Effects) {
        let from = self.state.detection;
        debug_assert!(from.can_transition_to(to), "illegal detection transition");
        self.state.detection = to;
        emit(
            out,
            Effect::Transition {
                from,
                to,
                pole: self.state.pole,
            },
        );
    }
}

fn emit(out: &mut Effects, effect: Effect) {
    let pushed = out.push(effect).is_ok();
    debug_assert!(pushed, "effect buffer exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KEY_MEDIA, LineMap};
    use crate::lines::LineId;

    const INSERTED: Level = Level::Low;
    const REMOVED: Level = Level::High;
    const FOUR_POLE: Level = Level::Low;
    const THREE_POLE: Level = Level::High;

    fn machine() -> JackMachine {
        let lines = LineMap::new(LineId(1), LineId(2), LineId(3), LineId(4));
        JackMachine::new(DetectorConfig::new(lines, KEY_MEDIA))
    }

    fn run(machine: &mut JackMachine, task: TaskKind, detect: Level) -> Effects {
        machine.handle(Input::Run { task, detect })
    }

    fn inserted_with_mic() -> JackMachine {
        let mut machine = machine();
        run(&mut machine, TaskKind::Insert, INSERTED);
        machine.handle(Input::Settled { pole: FOUR_POLE });
        run(&mut machine, TaskKind::ButtonEnable, INSERTED);
        machine
    }

    #[test]
    fn detect_edges_schedule_debounced_tasks() {
        let mut machine = machine();
        let effects = machine.handle(Input::JackEdge { detect: REMOVED });
        assert_eq!(
            effects.as_slice(),
            &[
                Effect::HoldAwake(SUSPEND_BLOCK_WINDOW),
                Effect::Cancel(TaskKind::Insert),
                Effect::Schedule {
                    task: TaskKind::Remove,
                    delay: Duration::from_millis(20),
                },
            ]
        );
    }

    #[test]
    fn insert_begins_by_biasing_and_settling() {
        let mut machine = machine();
        let effects = run(&mut machine, TaskKind::Insert, INSERTED);
        assert_eq!(
            effects.as_slice(),
            &[
                Effect::MicBias(true),
                Effect::MicEnable(true),
                Effect::Settle(machine.config().settle_delay),
            ]
        );
        assert!(machine.is_settling());
    }

    #[test]
    fn four_pole_reports_insert_then_microphone() {
        let mut machine = machine();
        run(&mut machine, TaskKind::Insert, INSERTED);
        let effects = machine.handle(Input::Settled { pole: FOUR_POLE });

        let reports: Vec<Effect, MAX_EFFECTS> = effects
            .iter()
            .copied()
            .filter(|effect| matches!(effect, Effect::Switch(..) | Effect::Sync))
            .collect();
        assert_eq!(
            reports.as_slice(),
            &[
                Effect::Switch(SwitchKind::HeadphoneInsert, true),
                Effect::Sync,
                Effect::Switch(SwitchKind::MicrophoneInsert, true),
                Effect::Sync,
            ]
        );
        assert!(effects.contains(&Effect::Schedule {
            task: TaskKind::ButtonEnable,
            delay: Duration::from_millis(600),
        }));
        assert_eq!(machine.state().detection, DetectionState::HeadsetWithMic);
        assert!(!machine.state().button_irq_enabled);
    }

    #[test]
    fn three_pole_turns_bias_back_off() {
        let mut machine = machine();
        run(&mut machine, TaskKind::Insert, INSERTED);
        let effects = machine.handle(Input::Settled { pole: THREE_POLE });

        assert_eq!(effects[0], Effect::MicBias(false));
        assert!(effects.contains(&Effect::Switch(SwitchKind::HeadphoneInsert, true)));
        assert!(
            !effects
                .iter()
                .any(|effect| matches!(effect, Effect::Switch(SwitchKind::MicrophoneInsert, _)))
        );
        assert_eq!(machine.state().detection, DetectionState::HeadsetNoMic);
        assert_eq!(machine.state().pole, PoleType::ThreePole);
    }

    #[test]
    fn fake_insert_has_no_side_effects() {
        let mut machine = machine();
        let effects = run(&mut machine, TaskKind::Insert, REMOVED);
        assert_eq!(
            effects.as_slice(),
            &[Effect::Ignored(IgnoreReason::FakeInsert)]
        );
        assert_eq!(machine.state(), JackState::new());
    }

    #[test]
    fn removal_during_settle_commits_then_queued_remove_undoes() {
        let mut machine = machine();
        run(&mut machine, TaskKind::Insert, INSERTED);
        machine.handle(Input::Settled { pole: FOUR_POLE });
        assert_eq!(machine.state().detection, DetectionState::HeadsetWithMic);

        let effects = run(&mut machine, TaskKind::Remove, REMOVED);
        assert!(effects.contains(&Effect::Switch(SwitchKind::HeadphoneInsert, false)));
        assert!(effects.contains(&Effect::Cancel(TaskKind::ButtonEnable)));
        assert_eq!(machine.state(), JackState::new());
    }

    #[test]
    fn button_edges_are_masked_until_enabled() {
        let mut machine = machine();
        let effects = machine.handle(Input::ButtonEdge {
            button: Level::High,
        });
        assert_eq!(
            effects.as_slice(),
            &[Effect::Ignored(IgnoreReason::ButtonMasked)]
        );
    }

    #[test]
    fn press_confirm_reports_key_once() {
        let mut machine = inserted_with_mic();
        let first = run(&mut machine, TaskKind::ButtonPress, INSERTED);
        assert_eq!(
            first.as_slice(),
            &[
                Effect::Key {
                    code: KEY_MEDIA,
                    pressed: true,
                },
                Effect::Sync,
            ]
        );

        let duplicate = run(&mut machine, TaskKind::ButtonPress, INSERTED);
        assert_eq!(
            duplicate.as_slice(),
            &[Effect::Ignored(IgnoreReason::AlreadyPressed)]
        );
    }

    #[test]
    fn confirm_after_unplug_is_ignored() {
        let mut machine = inserted_with_mic();
        let effects = run(&mut machine, TaskKind::ButtonPress, REMOVED);
        assert_eq!(
            effects.as_slice(),
            &[Effect::Ignored(IgnoreReason::JackRemoved)]
        );
        assert_eq!(machine.state().button, ButtonState::Released);
    }

    #[test]
    fn removal_while_pressed_releases_key_first() {
        let mut machine = inserted_with_mic();
        run(&mut machine, TaskKind::ButtonPress, INSERTED);

        let effects = run(&mut machine, TaskKind::Remove, REMOVED);
        let key_at = effects
            .iter()
            .position(|effect| matches!(effect, Effect::Key { pressed: false, .. }))
            .expect("key release missing");
        let switch_at = effects
            .iter()
            .position(|effect| matches!(effect, Effect::Switch(SwitchKind::HeadphoneInsert, false)))
            .expect("headphone removal missing");
        let transition_at = effects
            .iter()
            .position(|effect| matches!(effect, Effect::Transition { .. }))
            .expect("transition missing");
        assert!(key_at < transition_at);
        assert!(key_at < switch_at);
        assert!(effects.contains(&Effect::Switch(SwitchKind::MicrophoneInsert, false)));
        assert!(effects.contains(&Effect::ButtonIrq(false)));
        assert_eq!(machine.state(), JackState::new());
    }

    #[test]
    fn removal_cancels_pending_button_confirms() {
        let mut machine = inserted_with_mic();
        let effects = run(&mut machine, TaskKind::Remove, REMOVED);
        assert!(effects.contains(&Effect::Cancel(TaskKind::ButtonPress)));
        assert!(effects.contains(&Effect::Cancel(TaskKind::ButtonRelease)));
    }

    #[test]
    fn confirm_while_gate_closed_is_masked() {
        let mut machine = machine();
        run(&mut machine, TaskKind::Insert, INSERTED);
        machine.handle(Input::Settled { pole: FOUR_POLE });

        let effects = run(&mut machine, TaskKind::ButtonPress, INSERTED);
        assert_eq!(
            effects.as_slice(),
            &[Effect::Ignored(IgnoreReason::ButtonMasked)]
        );
        assert_eq!(machine.state().button, ButtonState::Released);
    }

    #[test]
    fn button_enable_requires_microphone() {
        let mut machine = machine();
        run(&mut machine, TaskKind::Insert, INSERTED);
        machine.handle(Input::Settled { pole: THREE_POLE });
        let effects = run(&mut machine, TaskKind::ButtonEnable, INSERTED);
        assert_eq!(
            effects.as_slice(),
            &[Effect::Ignored(IgnoreReason::NoMicrophone)]
        );
        assert!(!machine.state().button_irq_enabled);
    }

    #[test]
    fn redundant_insert_and_remove_are_suppressed() {
        let mut machine = inserted_with_mic();
        let effects = run(&mut machine, TaskKind::Insert, INSERTED);
        assert_eq!(
            effects.as_slice(),
            &[Effect::Ignored(IgnoreReason::AlreadyPresent)]
        );

        let mut idle = self::machine();
        let effects = run(&mut idle, TaskKind::Remove, REMOVED);
        assert_eq!(
            effects.as_slice(),
            &[Effect::Ignored(IgnoreReason::AlreadyAbsent)]
        );
    }

    #[test]
    fn detach_synthesizes_removal() {
        let mut machine = inserted_with_mic();
        let effects = machine.handle(Input::Detach);
        assert!(effects.contains(&Effect::Switch(SwitchKind::HeadphoneInsert, false)));
        assert!(effects.contains(&Effect::Cancel(TaskKind::ButtonPress)));
        assert_eq!(machine.state().detection, DetectionState::NoDevice);
    }

    #[test]
    fn attach_with_plug_present_schedules_immediate_insert() {
        let mut machine = machine();
        let effects = machine.handle(Input::Attach { detect: INSERTED });
        assert!(effects.contains(&Effect::Schedule {
            task: TaskKind::Insert,
            delay: Duration::ZERO,
        }));
    }
}
