//! Deferred task bookkeeping for the single ordered worker.
//!
//! Each [`TaskKind`] owns one slot. Scheduling a kind replaces whatever was
//! pending in its slot, so there is never more than one outstanding instance.
//! Due tasks are handed out earliest deadline first; ties go to the task that
//! was scheduled first.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

/// The five kinds of deferred work.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaskKind {
    Insert,
    Remove,
    ButtonEnable,
    ButtonPress,
    ButtonRelease,
}

/// Total number of distinct [`TaskKind`] variants.
pub const TASK_KIND_COUNT: usize = 5;

impl TaskKind {
    pub const ALL: [TaskKind; TASK_KIND_COUNT] = [
        TaskKind::Insert,
        TaskKind::Remove,
        TaskKind::ButtonEnable,
        TaskKind::ButtonPress,
        TaskKind::ButtonRelease,
    ];

    const fn index(self) -> usize {
        match self {
            TaskKind::Insert => 0,
            TaskKind::Remove => 1,
            TaskKind::ButtonEnable => 2,
            TaskKind::ButtonPress => 3,
            TaskKind::ButtonRelease => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TaskKind::Insert => "insert",
            TaskKind::Remove => "remove",
            TaskKind::ButtonEnable => "button-enable",
            TaskKind::ButtonPress => "button-press",
            TaskKind::ButtonRelease => "button-release",
        }
    }

    /// Kind whose pending instance is cancelled when this kind is scheduled.
    pub const fn supersedes(self) -> Option<TaskKind> {
        match self {
            TaskKind::Insert => Some(TaskKind::Remove),
            TaskKind::Remove => Some(TaskKind::Insert),
            _ => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Copy, Clone, Debug)]
struct Pending<Instant> {
    due: Instant,
    order: u32,
}

/// Per-kind pending slots with cancel-then-reschedule semantics.
#[derive(Clone, Debug)]
pub struct DeferredQueue<Instant> {
    slots: [Option<Pending<Instant>>; TASK_KIND_COUNT],
    next_order: u32,
}

impl<Instant> DeferredQueue<Instant>
where
    Instant: Copy + Ord,
{
    /// Creates a queue with nothing pending.
    pub const fn new() -> Self {
        Self {
            slots: [None; TASK_KIND_COUNT],
            next_order: 0,
        }
    }

    /// Schedules `kind` to run at `now + delay`, replacing any pending instance.
    ///
    /// Returns `true` when a pending instance was replaced.
    pub fn schedule(&mut self, kind: TaskKind, now: Instant, delay: Duration) -> bool
    where
        Instant: Add<Duration, Output = Instant>,
    {
        let order = self.next_order;
        self.next_order = self.next_order.wrapping_add(1);
        self.slots[kind.index()]
            .replace(Pending {
                due: now + delay,
                order,
            })
            .is_some()
    }

    /// Drops the pending instance of `kind`, returning `true` if one existed.
    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        self.slots[kind.index()].take().is_some()
    }

    /// Drops every pending task.
    pub fn clear(&mut self) {
        self.slots = [None; TASK_KIND_COUNT];
    }

    pub fn is_pending(&self, kind: TaskKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Deadline of the pending instance of `kind`, if any.
    pub fn due_at(&self, kind: TaskKind) -> Option<Instant> {
        self.slots[kind.index()].map(|pending| pending.due)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Earliest deadline among the pending tasks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.earliest().map(|(_, pending)| pending.due)
    }

    /// Removes and returns the next task whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TaskKind> {
        let (kind, pending) = self.earliest()?;
        if pending.due > now {
            return None;
        }
        self.slots[kind.index()] = None;
        Some(kind)
    }

    fn earliest(&self) -> Option<(TaskKind, Pending<Instant>)> {
        TaskKind::ALL
            .iter()
            .filter_map(|kind| self.slots[kind.index()].map(|pending| (*kind, pending)))
            .min_by(|(_, a), (_, b)| a.due.cmp(&b.due).then_with(|| a.order.cmp(&b.order)))
    }
}

impl<Instant> Default for DeferredQueue<Instant>
where
    Instant: Copy + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + rhs.as_millis() as u64)
        }
    }

    const fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn rescheduling_replaces_pending_instance() {
        let mut queue = DeferredQueue::new();
        assert!(!queue.schedule(TaskKind::ButtonPress, MockInstant(0), ms(200)));
        assert!(queue.schedule(TaskKind::ButtonPress, MockInstant(50), ms(200)));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.due_at(TaskKind::ButtonPress), Some(MockInstant(250)));
        assert_eq!(queue.pop_due(MockInstant(200)), None);
        assert_eq!(queue.pop_due(MockInstant(250)), Some(TaskKind::ButtonPress));
        assert!(queue.is_empty());
    }

    #[test]
    fn due_tasks_pop_in_deadline_order() {
        let mut queue = DeferredQueue::new();
        queue.schedule(TaskKind::ButtonEnable, MockInstant(0), ms(600));
        queue.schedule(TaskKind::Remove, MockInstant(0), ms(20));
        queue.schedule(TaskKind::ButtonRelease, MockInstant(0), ms(200));

        assert_eq!(queue.next_deadline(), Some(MockInstant(20)));
        let now = MockInstant(1_000);
        assert_eq!(queue.pop_due(now), Some(TaskKind::Remove));
        assert_eq!(queue.pop_due(now), Some(TaskKind::ButtonRelease));
        assert_eq!(queue.pop_due(now), Some(TaskKind::ButtonEnable));
        assert_eq!(queue.pop_due(now), None);
    }

    #[test]
    fn equal_deadlines_keep_schedule_order() {
        let mut queue = DeferredQueue::new();
        queue.schedule(TaskKind::ButtonRelease, MockInstant(0), ms(200));
        queue.schedule(TaskKind::ButtonPress, MockInstant(0), ms(200));

        assert_eq!(queue.pop_due(MockInstant(200)), Some(TaskKind::ButtonRelease));
        assert_eq!(queue.pop_due(MockInstant(200)), Some(TaskKind::ButtonPress));
    }

    #[test]
    fn insert_and_remove_supersede_each_other() {
        assert_eq!(TaskKind::Insert.supersedes(), Some(TaskKind::Remove));
        assert_eq!(TaskKind::Remove.supersedes(), Some(TaskKind::Insert));
        assert_eq!(TaskKind::ButtonPress.supersedes(), None);
    }
}
