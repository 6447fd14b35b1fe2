#![no_std]

// Headset jack detection shared by the firmware and the host emulator.
//
// The crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware access goes through the capability traits in
// `lines`, and all timing flows through a caller-supplied instant type.

pub mod config;
pub mod console;
pub mod detector;
pub mod lines;
pub mod machine;
pub mod queue;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, DetectorConfig, LineMap};
pub use detector::{AttachError, Capabilities, Detector};
pub use lines::{EventSink, JackLines, Level, LineRole, MicBias, StateQuery, SuspendBlocker};
pub use state::{ButtonState, DetectionState, JackState, PoleType};
