//! Composite video sample conditioning for FL2K-style VGA DACs.
//!
//! ## Technical Overview
//!
//! A DAC built from a USB 3.0 VGA adapter exposes three 8-bit channels (R, G, B) that are
//! clocked at a fixed sample rate. Pointing those channels at captured composite video
//! (4fsc samples from a time-base corrector or raw RF captures) turns the adapter into an
//! analog video source. The device pulls one fixed-size buffer per channel on demand; this
//! crate keeps every channel decoded, frame-aligned and level-corrected ahead of each pull.
//!
//! ### Per-channel processing
//!
//! - 8/16-bit, signed/unsigned source normalisation
//! - time-base-corrected (TBC) line/field/frame bookkeeping with per-frame line skipping
//! - combination of two sources into one channel
//! - automatic chroma gain referenced to the colour burst
//! - IRE level shifting of active video
//! - output signal gain with clipping
//! - per-frame audio interleaving or raw echo on a side channel
//!
//! ### Scheduling
//!
//! Channels run as independent tasks per fill cycle. Four read modes choose how the tasks
//! are joined, from fully parallel to strictly sequential.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use cvbs::process::orchestrate::ChannelOrchestrator;
//! use cvbs::process::pipeline::ChannelPipeline;
//! use cvbs::standard::VideoStandard;
//! use cvbs::structs::config::{ChannelConfig, Color, ReadMode};
//! use cvbs::utils::source::InputReader;
//!
//! let config = ChannelConfig::for_path(Color::Red, "capture.tbc");
//! let source = InputReader::new("capture.tbc")?;
//! let pipeline = ChannelPipeline::new(config, VideoStandard::Ntsc, true, Box::new(source));
//!
//! let shutdown = Arc::new(AtomicBool::new(false));
//! let mut orchestrator = ChannelOrchestrator::new(ReadMode::Parallel, shutdown);
//! orchestrator.attach(pipeline);
//!
//! let report = orchestrator.fill_all()?;
//! if let Some(buffer) = report.buffer(Color::Red) {
//!     assert_eq!(buffer.len(), cvbs::process::BUF_LEN);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Per-standard timing constants.
///
/// [`standard::timing_for`] returns line, frame, active-video and colour-burst positions
/// for NTSC and PAL at 4fsc, in source bytes.
pub mod standard;

/// Channel processing.
///
/// 1. **Skip calculation** ([`process::skip`]): TBC line-skip accounting per buffer.
/// 2. **Sample math** ([`process::sample`]): decode, combine and level corrections.
/// 3. **Pipeline** ([`process::pipeline`]): the per-channel buffer fill loop.
/// 4. **Orchestration** ([`process::orchestrate`]): read-mode scheduling across channels.
pub mod process;

/// Configuration and state.
///
/// - **Formats** ([`structs::format`]): sample width, signedness, extension defaults
/// - **Configuration** ([`structs::config`]): channel and player configuration
/// - **State** ([`structs::state`]): per-channel position counters
pub mod structs;

/// External interfaces and supporting infrastructure.
///
/// - **Errors** ([`utils::errors`]): error taxonomy
/// - **Sources** ([`utils::source`]): byte sources (files, stdin)
/// - **Side channel** ([`utils::side_channel`]): audio mux / raw echo output
/// - **Device** ([`utils::device`]): the DAC device sink interface
pub mod utils;
