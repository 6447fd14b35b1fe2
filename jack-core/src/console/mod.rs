//! Bench console shared between the emulator and host tooling.
//!
//! The console drives simulated jack lines (`plug`, `unplug`, `button`,
//! `wait`) and inspects the detector (`status`, `log`). Its grammar lives in
//! [`grammar`] and is implemented with a token/parse pipeline that stays
//! compatible with `no_std`.

pub mod catalog;
pub mod grammar;
pub mod status;
