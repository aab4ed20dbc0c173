//! Configuration records and per-channel state.
//!
//! Configuration is built once at startup and read-only afterwards. State lives for the
//! whole session and is owned by exactly one channel pipeline.

pub mod config;
pub mod format;
pub mod state;
