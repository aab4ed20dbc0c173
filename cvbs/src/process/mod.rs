/// Blanking-line accounting for time-base-corrected sources.
///
/// Provides [`bytes_to_skip`](skip::bytes_to_skip), the number of source bytes one buffer
/// fill discards to stay frame-aligned.
pub mod skip;

/// Sample-level arithmetic.
///
/// Decoding of raw samples into the 8-bit working domain, combination of two sources,
/// chroma gain, IRE shift and output gain.
pub mod sample;

/// The per-channel buffer fill loop.
///
/// Provides the [`ChannelPipeline`](pipeline::ChannelPipeline) that owns one channel's
/// sources, state and side-channel role.
pub mod pipeline;

/// Scheduling of channel pipelines within a fill cycle.
///
/// Provides the [`ChannelOrchestrator`](orchestrate::ChannelOrchestrator) and the
/// read-mode stage plans.
pub mod orchestrate;

/// Output samples per channel and pull.
pub const BUF_LEN: usize = 1_310_720;
