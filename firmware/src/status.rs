#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Interrupt tasks and the worker exchange the button gate, the wake window
//! and the published detection state through lightweight atomics so no task has
//! to borrow another task's peripherals.

use jack_core::{DetectionState, JackState};
use portable_atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Published detection state (`DetectionState::as_raw`).
static DETECTION: AtomicU8 = AtomicU8::new(0);
/// Debounced key state as last reported.
static BUTTON_PRESSED: AtomicBool = AtomicBool::new(false);
/// Button interrupt gate; the key task drops edges while this is clear.
static BUTTON_IRQ_ENABLED: AtomicBool = AtomicBool::new(false);
/// Suspend is blocked until this instant (ms since boot).
static AWAKE_UNTIL_MS: AtomicU64 = AtomicU64::new(0);

/// Publishes the worker's view of the jack.
pub fn publish(state: JackState) {
    DETECTION.store(state.detection.as_raw(), Ordering::Release);
}

/// Detection state last published by the worker.
pub fn detection() -> DetectionState {
    DetectionState::from_raw(DETECTION.load(Ordering::Acquire)).unwrap_or_default()
}

pub fn record_button_pressed(pressed: bool) {
    BUTTON_PRESSED.store(pressed, Ordering::Relaxed);
}

pub fn button_pressed() -> bool {
    BUTTON_PRESSED.load(Ordering::Relaxed)
}

pub fn set_button_irq_enabled(enabled: bool) {
    BUTTON_IRQ_ENABLED.store(enabled, Ordering::Release);
}

pub fn button_irq_enabled() -> bool {
    BUTTON_IRQ_ENABLED.load(Ordering::Acquire)
}

/// Extends the no-suspend window to `until_ms`; never shortens it.
pub fn hold_awake_until(until_ms: u64) {
    AWAKE_UNTIL_MS.fetch_max(until_ms, Ordering::AcqRel);
}

/// Returns `true` while a jack interrupt is still holding off suspend.
pub fn suspend_blocked(now_ms: u64) -> bool {
    now_ms < AWAKE_UNTIL_MS.load(Ordering::Acquire)
}
