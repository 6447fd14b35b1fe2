#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Mirrors detector telemetry to defmt / stdout.
//!
//! The detector keeps its own history ring. After each worker pass the
//! [`TelemetryDrain`] logs every record it has not seen yet, so bring-up
//! traces show inserts, key presses and discarded tasks in order.

use jack_core::telemetry::{EventId, JackEventKind, JackRecord, TelemetryRecorder};

use crate::jack::FirmwareInstant;

/// Cursor over the detector's telemetry ring.
#[derive(Debug, Default)]
pub struct TelemetryDrain {
    next: EventId,
}

impl TelemetryDrain {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Logs every record newer than the previous drain. Returns how many were logged.
    pub fn drain(&mut self, recorder: &TelemetryRecorder<FirmwareInstant>) -> usize {
        let mut logged = 0;
        for record in recorder.since(self.next) {
            log_record(record);
            logged += 1;
        }
        self.next = recorder.next_id();
        logged
    }
}

fn log_record(record: &JackRecord<FirmwareInstant>) {
    let timestamp_ms = record.timestamp.as_millis();
    let held_ms = record
        .held_for
        .map(|held| u64::try_from(held.as_millis()).unwrap_or(u64::MAX));

    match record.event {
        JackEventKind::Ignored(reason) => {
            emit_debug(record.id, reason.label(), timestamp_ms);
        }
        event => emit_info(record.id, event, timestamp_ms, held_ms),
    }
}

#[cfg(target_os = "none")]
fn emit_info(id: EventId, event: JackEventKind, timestamp_ms: u64, held_ms: Option<u64>) {
    let code = event.to_raw();
    match held_ms {
        Some(held) => defmt::info!(
            "telemetry:jack #{} {} t={}ms held={}ms",
            id,
            defmt::Display2Format(&event),
            timestamp_ms,
            held
        ),
        None => defmt::info!(
            "telemetry:jack #{} {} code={:#x} t={}ms",
            id,
            defmt::Display2Format(&event),
            code,
            timestamp_ms
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_info(id: EventId, event: JackEventKind, timestamp_ms: u64, held_ms: Option<u64>) {
    let code = event.to_raw();
    match held_ms {
        Some(held) => println!("telemetry:jack #{id} {event} t={timestamp_ms}ms held={held}ms"),
        None => println!("telemetry:jack #{id} {event} code={code:#x} t={timestamp_ms}ms"),
    }
}

#[cfg(target_os = "none")]
fn emit_debug(id: EventId, reason: &'static str, timestamp_ms: u64) {
    defmt::debug!("telemetry:jack #{} ignored {} t={}ms", id, reason, timestamp_ms);
}

#[cfg(not(target_os = "none"))]
fn emit_debug(id: EventId, reason: &'static str, timestamp_ms: u64) {
    println!("telemetry:jack #{id} ignored {reason} t={timestamp_ms}ms");
}
