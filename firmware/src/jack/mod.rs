#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Firmware glue around the `jack-core` detector.
//!
//! Interrupt tasks stamp each edge with the embassy clock and hand it to the
//! worker through [`EdgeQueue`]. The worker owns the [`Detector`] and is the
//! only context that mutates jack state.

use core::ops::Add;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Instant};
use jack_core::lines::SwitchKind;
use jack_core::telemetry::TelemetryInstant;
use jack_core::{EventSink, Level};

use crate::status;

/// Depth of the edge queue between the interrupt tasks and the worker.
pub const EDGE_QUEUE_DEPTH: usize = 8;

#[cfg(target_os = "none")]
type EdgeMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type EdgeMutex = NoopRawMutex;

/// Which interrupt produced an edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeSource {
    Detect,
    Button,
}

impl EdgeSource {
    pub const fn label(self) -> &'static str {
        match self {
            EdgeSource::Detect => "detect",
            EdgeSource::Button => "key",
        }
    }
}

/// Level sampled by an interrupt task, stamped at the edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineEdge {
    pub source: EdgeSource,
    pub level: Level,
    pub at: FirmwareInstant,
}

pub type EdgeQueue = Channel<EdgeMutex, LineEdge, EDGE_QUEUE_DEPTH>;
pub type EdgeSender<'a> = Sender<'a, EdgeMutex, LineEdge, EDGE_QUEUE_DEPTH>;
pub type EdgeReceiver<'a> = Receiver<'a, EdgeMutex, LineEdge, EDGE_QUEUE_DEPTH>;

/// Embassy instant adapted to the arithmetic the detector expects.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0.as_millis()
    }

    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: core::time::Duration) -> Self::Output {
        Self(self.0 + core_duration_to_embassy(rhs))
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        core::time::Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

pub fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

/// Input-subsystem stand-in: logs every report and mirrors the key state.
#[derive(Debug, Default)]
pub struct LoggingSink {
    batch: u16,
}

impl LoggingSink {
    pub const fn new() -> Self {
        Self { batch: 0 }
    }
}

impl EventSink for LoggingSink {
    fn report_switch(&mut self, switch: SwitchKind, active: bool) {
        self.batch = self.batch.saturating_add(1);
        log_report(switch.label(), u16::from(active));
    }

    fn report_key(&mut self, code: u16, pressed: bool) {
        self.batch = self.batch.saturating_add(1);
        status::record_button_pressed(pressed);
        log_key(code, pressed);
    }

    fn sync(&mut self) {
        log_sync(self.batch);
        self.batch = 0;
    }
}

#[cfg(target_os = "none")]
fn log_report(switch: &'static str, value: u16) {
    defmt::info!("input: {}={}", switch, value);
}

#[cfg(not(target_os = "none"))]
fn log_report(switch: &'static str, value: u16) {
    println!("input: {switch}={value}");
}

#[cfg(target_os = "none")]
fn log_key(code: u16, pressed: bool) {
    defmt::info!("input: key {}={}", code, u8::from(pressed));
}

#[cfg(not(target_os = "none"))]
fn log_key(code: u16, pressed: bool) {
    println!("input: key {code}={}", u8::from(pressed));
}

#[cfg(target_os = "none")]
fn log_sync(batch: u16) {
    defmt::debug!("input: sync ({} reports)", batch);
}

#[cfg(not(target_os = "none"))]
fn log_sync(batch: u16) {
    println!("input: sync ({batch} reports)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_durations_add_to_embassy_instants() {
        let start = FirmwareInstant::from(Instant::from_millis(100));
        let later = start + core::time::Duration::from_millis(20);
        assert_eq!(later.as_millis(), 120);
        assert_eq!(
            later.saturating_duration_since(start),
            core::time::Duration::from_millis(20)
        );
        assert_eq!(
            start.saturating_duration_since(later),
            core::time::Duration::ZERO
        );
    }

    #[test]
    fn sink_mirrors_key_state() {
        let mut sink = LoggingSink::new();
        sink.report_key(226, true);
        assert!(status::button_pressed());
        sink.sync();
        sink.report_key(226, false);
        assert!(!status::button_pressed());
    }

    #[test]
    fn edge_queue_is_fifo() {
        let queue = EdgeQueue::new();
        for (index, level) in [Level::Low, Level::High].into_iter().enumerate() {
            queue
                .try_send(LineEdge {
                    source: EdgeSource::Detect,
                    level,
                    at: FirmwareInstant::from(Instant::from_millis(index as u64)),
                })
                .unwrap();
        }
        assert_eq!(queue.try_receive().unwrap().level, Level::Low);
        assert_eq!(queue.try_receive().unwrap().level, Level::High);
    }
}
