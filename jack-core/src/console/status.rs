//! Status surface for the bench console.
//!
//! [`StatusSnapshot::capture`] samples a running detector, and
//! [`StatusFormatter`] renders the snapshot the same way on every front-end.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use crate::detector::Detector;
use crate::lines::{EventSink, JackLines, Level, LineRole, MicBias, SuspendBlocker};
use crate::queue::{TASK_KIND_COUNT, TaskKind};
use crate::state::JackState;
use crate::telemetry::TelemetryInstant;

/// Point-in-time view of the detector and its lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub jack: JackState,
    pub settling: bool,
    /// Sampled levels in [`LineRole::ALL`] order.
    pub levels: [Level; 4],
    /// Remaining delay per pending task, in [`TaskKind::ALL`] order.
    pub pending: [Option<Duration>; TASK_KIND_COUNT],
}

impl StatusSnapshot {
    /// Samples `detector` at `now`.
    pub fn capture<Instant, L, B, S, W>(
        detector: &mut Detector<Instant, L, B, S, W>,
        now: Instant,
    ) -> Self
    where
        Instant: Copy + Ord + Add<Duration, Output = Instant> + TelemetryInstant,
        L: JackLines,
        B: MicBias,
        S: EventSink,
        W: SuspendBlocker,
    {
        let mut levels = [Level::Low; 4];
        for (slot, role) in levels.iter_mut().zip(LineRole::ALL) {
            *slot = detector.lines_mut().read(role);
        }

        let mut pending = [None; TASK_KIND_COUNT];
        for (slot, task) in pending.iter_mut().zip(TaskKind::ALL) {
            *slot = detector
                .queue()
                .due_at(task)
                .map(|due| due.saturating_duration_since(now));
        }

        Self {
            jack: detector.jack_state(),
            settling: detector.is_settling(),
            levels,
            pending,
        }
    }
}

/// Renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the state line (e.g. `jack state=headset pole=4-pole button=released irq=on`).
    pub fn write_state_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let jack = &self.snapshot.jack;
        write!(
            writer,
            "jack state={} pole={} button={} irq={}",
            jack.detection,
            jack.pole,
            if jack.button.is_pressed() {
                "pressed"
            } else {
                "released"
            },
            if jack.button_irq_enabled { "on" } else { "off" },
        )?;
        if self.snapshot.settling {
            writer.write_str(" settling")?;
        }
        Ok(())
    }

    /// Writes the line-level line (e.g. `lines detect=low jpole=high key=low mic-en=low`).
    pub fn write_lines_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("lines")?;
        for (role, level) in LineRole::ALL.iter().zip(self.snapshot.levels) {
            write!(
                writer,
                " {}={}",
                role.label(),
                if level.is_high() { "high" } else { "low" }
            )?;
        }
        Ok(())
    }

    /// Writes the queue line (e.g. `queue insert=+20ms button-enable=+600ms`).
    pub fn write_queue_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("queue")?;
        let mut any = false;
        for (task, due) in TaskKind::ALL.iter().zip(self.snapshot.pending) {
            if let Some(due) = due {
                any = true;
                write!(writer, " {task}=")?;
                write_duration(writer, due)?;
            }
        }
        if !any {
            writer.write_str(" idle")?;
        }
        Ok(())
    }
}

/// Writes `+1.2s`, `+20ms` or `+0ms` style offsets.
pub fn write_duration<W: fmt::Write>(writer: &mut W, value: Duration) -> fmt::Result {
    if value >= Duration::from_secs(1) {
        let millis = value.as_millis();
        let seconds = millis / 1_000;
        let tenths = (millis % 1_000) / 100;
        write!(writer, "+{seconds}.{tenths}s")
    } else {
        write!(writer, "+{}ms", value.as_millis())
    }
}
