//! External interfaces and supporting infrastructure.
//!
//! Provides the byte source and device sink abstractions, the side-channel output and
//! the error taxonomy shared by the processing layer.

pub mod device;
pub mod errors;
pub mod side_channel;
pub mod source;
