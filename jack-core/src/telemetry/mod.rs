//! Telemetry event catalog and history ring shared by firmware and host targets.
//!
//! Every state change the detector publishes, and every deferred task that was
//! discarded as stale, lands in a fixed-size ring so the bench console and the
//! firmware log drain can replay recent activity. Events encode to compact
//! numeric codes for transport over diagnostics channels.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::machine::IgnoreReason;
use crate::state::PoleType;

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JackEventKind {
    Inserted(PoleType),
    Removed,
    ButtonPressed,
    ButtonReleased,
    ButtonGate(bool),
    Ignored(IgnoreReason),
}

impl fmt::Display for JackEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JackEventKind::Inserted(pole) => write!(f, "inserted {pole}"),
            JackEventKind::Removed => f.write_str("removed"),
            JackEventKind::ButtonPressed => f.write_str("button-pressed"),
            JackEventKind::ButtonReleased => f.write_str("button-released"),
            JackEventKind::ButtonGate(true) => f.write_str("button-irq on"),
            JackEventKind::ButtonGate(false) => f.write_str("button-irq off"),
            JackEventKind::Ignored(reason) => write!(f, "ignored {reason}"),
        }
    }
}

const IGNORE_REASONS: [IgnoreReason; 11] = [
    IgnoreReason::FakeInsert,
    IgnoreReason::FakeRemove,
    IgnoreReason::AlreadyPresent,
    IgnoreReason::AlreadyAbsent,
    IgnoreReason::NotSettling,
    IgnoreReason::NoMicrophone,
    IgnoreReason::ButtonAlreadyEnabled,
    IgnoreReason::JackRemoved,
    IgnoreReason::AlreadyPressed,
    IgnoreReason::AlreadyReleased,
    IgnoreReason::ButtonMasked,
];

impl JackEventKind {
    const INSERTED_3P_CODE: u16 = 0x0000;
    const INSERTED_4P_CODE: u16 = 0x0001;
    const REMOVED_CODE: u16 = 0x0002;
    const PRESSED_CODE: u16 = 0x0003;
    const RELEASED_CODE: u16 = 0x0004;
    const GATE_OFF_CODE: u16 = 0x0005;
    const GATE_ON_CODE: u16 = 0x0006;
    const IGNORED_BASE: u16 = 0x0010;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            JackEventKind::Inserted(PoleType::ThreePole) => Self::INSERTED_3P_CODE,
            JackEventKind::Inserted(PoleType::FourPole) => Self::INSERTED_4P_CODE,
            JackEventKind::Removed => Self::REMOVED_CODE,
            JackEventKind::ButtonPressed => Self::PRESSED_CODE,
            JackEventKind::ButtonReleased => Self::RELEASED_CODE,
            JackEventKind::ButtonGate(false) => Self::GATE_OFF_CODE,
            JackEventKind::ButtonGate(true) => Self::GATE_ON_CODE,
            JackEventKind::Ignored(reason) => IGNORE_REASONS
                .iter()
                .position(|candidate| *candidate == reason)
                .and_then(|index| u16::try_from(index).ok())
                .map_or(Self::IGNORED_BASE, |index| Self::IGNORED_BASE + index),
        }
    }

    /// Decodes a raw discriminant; unknown codes yield `None`.
    #[must_use]
    pub fn from_raw(code: u16) -> Option<Self> {
        let event = match code {
            Self::INSERTED_3P_CODE => JackEventKind::Inserted(PoleType::ThreePole),
            Self::INSERTED_4P_CODE => JackEventKind::Inserted(PoleType::FourPole),
            Self::REMOVED_CODE => JackEventKind::Removed,
            Self::PRESSED_CODE => JackEventKind::ButtonPressed,
            Self::RELEASED_CODE => JackEventKind::ButtonReleased,
            Self::GATE_OFF_CODE => JackEventKind::ButtonGate(false),
            Self::GATE_ON_CODE => JackEventKind::ButtonGate(true),
            value => {
                let index = value.checked_sub(Self::IGNORED_BASE)?;
                JackEventKind::Ignored(*IGNORE_REASONS.get(usize::from(index))?)
            }
        };
        Some(event)
    }
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JackRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: JackEventKind,
    /// Time spent in the state this event ends (insert-to-remove, press-to-release).
    pub held_for: Option<Duration>,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<JackRecord<TInstant>, CAPACITY>;

/// Records jack events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    inserted_at: Option<TInstant>,
    pressed_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            inserted_at: None,
            pressed_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, JackRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `first`, oldest first.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &JackRecord<TInstant>> + '_ {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id.wrapping_sub(first) < EventId::MAX / 2)
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&JackRecord<TInstant>> {
        self.ring.recent()
    }

    /// Identifier the next record will receive.
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a headset insertion.
    pub fn record_inserted(&mut self, pole: PoleType, timestamp: TInstant) -> EventId {
        self.inserted_at = Some(timestamp);
        self.record(JackEventKind::Inserted(pole), None, timestamp)
    }

    /// Records a removal and how long the headset stayed classified.
    pub fn record_removed(&mut self, timestamp: TInstant) -> EventId {
        let held = self
            .inserted_at
            .take()
            .map(|start| timestamp.saturating_duration_since(start));
        self.pressed_at = None;
        self.record(JackEventKind::Removed, held, timestamp)
    }

    /// Records a confirmed key transition.
    pub fn record_key(&mut self, pressed: bool, timestamp: TInstant) -> EventId {
        if pressed {
            self.pressed_at = Some(timestamp);
            self.record(JackEventKind::ButtonPressed, None, timestamp)
        } else {
            let held = self
                .pressed_at
                .take()
                .map(|start| timestamp.saturating_duration_since(start));
            self.record(JackEventKind::ButtonReleased, held, timestamp)
        }
    }

    /// Records the button interrupt being unmasked or masked.
    pub fn record_gate(&mut self, enabled: bool, timestamp: TInstant) -> EventId {
        self.record(JackEventKind::ButtonGate(enabled), None, timestamp)
    }

    /// Records a deferred task or edge that was discarded.
    pub fn record_ignored(&mut self, reason: IgnoreReason, timestamp: TInstant) -> EventId {
        self.record(JackEventKind::Ignored(reason), None, timestamp)
    }

    /// Records an arbitrary event.
    pub fn record(
        &mut self,
        event: JackEventKind,
        held_for: Option<Duration>,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(JackRecord {
            id,
            timestamp,
            event,
            held_for,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
