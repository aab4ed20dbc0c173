use anyhow::Result;
use cvbs::process::orchestrate::{ChannelOrchestrator, FillReport};
use cvbs::utils::errors::PipelineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

/// Why the fill thread stopped producing buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillEnd {
    /// Every channel ran out of input.
    Exhausted,
    /// The requested number of buffers was produced.
    Limit,
    /// Shutdown was requested, or the device stopped pulling.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillSummary {
    pub fills: u64,
    pub end: FillEnd,
}

pub struct FillThreadConfig {
    pub orchestrator: ChannelOrchestrator,
    pub tx: mpsc::SyncSender<FillReport>,
    pub shutdown: Arc<AtomicBool>,
    pub buffer_limit: Option<u64>,
}

/// Keep the next buffer set ready ahead of each device pull.
///
/// The bounded channel holds one finished set while the device transmits the previous
/// one, so the orchestrator never runs more than one fill ahead.
pub fn spawn_fill_thread(config: FillThreadConfig) -> thread::JoinHandle<Result<FillSummary>> {
    thread::spawn(move || -> Result<FillSummary> {
        let FillThreadConfig {
            mut orchestrator,
            tx,
            shutdown,
            buffer_limit,
        } = config;

        let mut fills = 0u64;
        let end = loop {
            if buffer_limit.is_some_and(|limit| fills >= limit) {
                break FillEnd::Limit;
            }
            if shutdown.load(Ordering::SeqCst) {
                break FillEnd::Stopped;
            }

            let report = match orchestrator.fill_all() {
                Ok(report) => report,
                Err(PipelineError::Cancelled { color }) => {
                    log::debug!("Fill cancelled while {color} was running");
                    break FillEnd::Stopped;
                }
                Err(e) => return Err(e.into()),
            };

            let exhausted = orchestrator.active_channels().is_empty();
            if report.filled_count() > 0 {
                fills += 1;
                if tx.send(report).is_err() {
                    break FillEnd::Stopped;
                }
            }
            if exhausted {
                break FillEnd::Exhausted;
            }
        };

        log::info!("Fill thread finished after {fills} buffer sets ({end:?})");
        Ok(FillSummary { fills, end })
    })
}
