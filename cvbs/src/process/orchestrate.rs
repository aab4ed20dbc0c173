use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use log::{error, info, trace, warn};

use crate::process::pipeline::ChannelPipeline;
use crate::structs::config::{Color, PlayerConfig, ReadMode};
use crate::utils::device::Buffer;
use crate::utils::errors::PipelineError;

use Color::{Blue, Green, Red};

/// Channel groups launched together; each group is joined before the next one starts.
pub fn stages(read_mode: ReadMode) -> &'static [&'static [Color]] {
    match read_mode {
        ReadMode::Parallel => &[&[Red, Green, Blue]],
        ReadMode::RedFirst => &[&[Red], &[Green, Blue]],
        ReadMode::RedGreenFirst => &[&[Red, Green], &[Blue]],
        ReadMode::Sequential => &[&[Red], &[Green], &[Blue]],
    }
}

#[derive(Debug)]
pub enum ChannelOutcome {
    Filled(Buffer),
    /// The channel ran out of input (or failed reading it) during this fill.
    Exhausted,
}

/// Result of one fill cycle.
#[derive(Debug, Default)]
pub struct FillReport {
    outcomes: [Option<ChannelOutcome>; 3],
    completion_order: Vec<Color>,
}

impl FillReport {
    pub fn outcome(&self, color: Color) -> Option<&ChannelOutcome> {
        self.outcomes[color.index()].as_ref()
    }

    pub fn buffer(&self, color: Color) -> Option<&Buffer> {
        match self.outcome(color) {
            Some(ChannelOutcome::Filled(buffer)) => Some(buffer),
            _ => None,
        }
    }

    pub fn take_buffer(&mut self, color: Color) -> Option<Buffer> {
        match self.outcomes[color.index()].take() {
            Some(ChannelOutcome::Filled(buffer)) => Some(buffer),
            other => {
                self.outcomes[color.index()] = other;
                None
            }
        }
    }

    /// Channels in the order their pipelines finished.
    pub fn completion_order(&self) -> &[Color] {
        &self.completion_order
    }

    pub fn filled_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Some(ChannelOutcome::Filled(_))))
            .count()
    }
}

struct ChannelSlot {
    pipeline: ChannelPipeline,
    exhausted: bool,
}

/// Runs the active channel pipelines once per fill cycle under a [`ReadMode`].
///
/// Each pipeline is moved onto its own scoped thread for the duration of a stage, so the
/// only synchronisation is the join at the end of the stage.
pub struct ChannelOrchestrator {
    read_mode: ReadMode,
    shutdown: Arc<AtomicBool>,
    slots: [Option<ChannelSlot>; 3],
    fills: u64,
}

impl ChannelOrchestrator {
    pub fn new(read_mode: ReadMode, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            read_mode,
            shutdown,
            slots: [None, None, None],
            fills: 0,
        }
    }

    /// Validate `config` and open a pipeline for every configured channel.
    pub fn from_config(config: &PlayerConfig, shutdown: Arc<AtomicBool>) -> Result<Self> {
        config.validate()?;

        let mut orchestrator = Self::new(config.read_mode, shutdown);
        for channel in &config.channels {
            let pipeline = ChannelPipeline::open(channel, config)
                .with_context(|| format!("Failed to set up channel {}", channel.color))?;
            orchestrator.attach(pipeline);
        }

        info!(
            "Read mode {:?}, channels {:?}",
            config.read_mode,
            orchestrator.active_channels()
        );
        Ok(orchestrator)
    }

    /// Make `pipeline` the active pipeline for its channel.
    pub fn attach(&mut self, pipeline: ChannelPipeline) {
        let index = pipeline.color().index();
        self.slots[index] = Some(ChannelSlot {
            pipeline,
            exhausted: false,
        });
    }

    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    pub fn pipeline(&self, color: Color) -> Option<&ChannelPipeline> {
        self.slots[color.index()].as_ref().map(|slot| &slot.pipeline)
    }

    /// Channels still contributing buffers.
    pub fn active_channels(&self) -> Vec<Color> {
        Color::ALL
            .into_iter()
            .filter(|color| {
                self.slots[color.index()]
                    .as_ref()
                    .is_some_and(|slot| !slot.exhausted)
            })
            .collect()
    }

    /// Fill one buffer for every active channel.
    ///
    /// Exhausted channels report [`ChannelOutcome::Exhausted`] once and are skipped from
    /// then on. When no channel is left the shutdown flag is raised. A shutdown observed
    /// by any pipeline fails the whole fill with [`PipelineError::Cancelled`].
    pub fn fill_all(&mut self) -> Result<FillReport, PipelineError> {
        let mut report = FillReport::default();
        let shutdown = self.shutdown.as_ref();

        for stage in stages(self.read_mode) {
            let (tx, rx) = mpsc::channel();

            thread::scope(|scope| {
                for slot in self.slots.iter_mut().flatten() {
                    let color = slot.pipeline.color();
                    if slot.exhausted || !stage.contains(&color) {
                        continue;
                    }

                    let tx = tx.clone();
                    let pipeline = &mut slot.pipeline;
                    scope.spawn(move || {
                        let result = pipeline.run(shutdown);
                        let _ = tx.send((color, result));
                    });
                }
            });
            drop(tx);

            for (color, result) in rx {
                report.completion_order.push(color);
                let outcome = match result {
                    Ok(buffer) => ChannelOutcome::Filled(buffer),
                    Err(e @ PipelineError::Cancelled { .. }) => return Err(e),
                    Err(e) => {
                        match e {
                            PipelineError::Exhausted { .. } => warn!("{e}"),
                            _ => error!("{e}"),
                        }
                        if let Some(slot) = self.slots[color.index()].as_mut() {
                            slot.exhausted = true;
                        }
                        ChannelOutcome::Exhausted
                    }
                };
                report.outcomes[color.index()] = Some(outcome);
            }
        }

        self.fills += 1;
        trace!(
            "fill {} complete, order {:?}",
            self.fills, report.completion_order
        );

        if self.active_channels().is_empty() {
            warn!("All channels exhausted, requesting shutdown");
            self.shutdown.store(true, Ordering::SeqCst);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::BUF_LEN;
    use crate::standard::VideoStandard;
    use crate::structs::config::ChannelConfig;
    use crate::utils::source::ByteSource;
    use std::io::{self, Cursor};
    use std::time::Duration;

    /// Source that stalls on its first read.
    struct SlowSource {
        inner: Cursor<Vec<u8>>,
        delay: Option<Duration>,
    }

    impl ByteSource for SlowSource {
        fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
            if let Some(delay) = self.delay.take() {
                thread::sleep(delay);
            }
            self.inner.read_chunk(buffer)
        }

        fn seek_to(&mut self, offset: u64) -> io::Result<()> {
            self.inner.seek_to(offset)
        }
    }

    fn pipeline(color: Color, len: usize, delay_ms: u64) -> ChannelPipeline {
        let source = SlowSource {
            inner: Cursor::new(vec![0u8; len]),
            delay: (delay_ms > 0).then(|| Duration::from_millis(delay_ms)),
        };
        ChannelPipeline::new(
            ChannelConfig::for_path(color, "x.u8"),
            VideoStandard::Ntsc,
            true,
            Box::new(source),
        )
    }

    fn orchestrator(read_mode: ReadMode) -> ChannelOrchestrator {
        ChannelOrchestrator::new(read_mode, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn stage_plans() {
        assert_eq!(stages(ReadMode::Parallel), &[&[Red, Green, Blue][..]]);
        assert_eq!(stages(ReadMode::RedFirst), &[&[Red][..], &[Green, Blue][..]]);
        assert_eq!(stages(ReadMode::RedGreenFirst), &[&[Red, Green][..], &[Blue][..]]);
        assert_eq!(stages(ReadMode::Sequential).len(), 3);
    }

    #[test]
    fn sequential_completes_in_channel_order() -> anyhow::Result<()> {
        let mut orchestrator = orchestrator(ReadMode::Sequential);
        orchestrator.attach(pipeline(Blue, BUF_LEN, 0));
        orchestrator.attach(pipeline(Red, BUF_LEN, 150));
        orchestrator.attach(pipeline(Green, BUF_LEN, 50));

        let report = orchestrator.fill_all()?;
        assert_eq!(report.completion_order(), &[Red, Green, Blue]);
        assert_eq!(report.filled_count(), 3);
        Ok(())
    }

    #[test]
    fn red_first_finishes_red_before_others() -> anyhow::Result<()> {
        let mut orchestrator = orchestrator(ReadMode::RedFirst);
        orchestrator.attach(pipeline(Red, BUF_LEN, 150));
        orchestrator.attach(pipeline(Green, BUF_LEN, 0));
        orchestrator.attach(pipeline(Blue, BUF_LEN, 0));

        let report = orchestrator.fill_all()?;
        assert_eq!(report.completion_order()[0], Red);
        assert_eq!(report.completion_order().len(), 3);
        Ok(())
    }

    #[test]
    fn parallel_fills_every_active_channel() -> anyhow::Result<()> {
        let mut orchestrator = orchestrator(ReadMode::Parallel);
        orchestrator.attach(pipeline(Red, BUF_LEN, 0));
        orchestrator.attach(pipeline(Blue, BUF_LEN, 0));

        let mut report = orchestrator.fill_all()?;
        assert_eq!(report.filled_count(), 2);
        assert!(report.outcome(Green).is_none());
        assert_eq!(report.take_buffer(Red).map(|b| b.len()), Some(BUF_LEN));
        assert!(report.take_buffer(Red).is_none());
        Ok(())
    }

    #[test]
    fn exhaustion_is_isolated() -> anyhow::Result<()> {
        let mut orchestrator = orchestrator(ReadMode::Parallel);
        orchestrator.attach(pipeline(Red, BUF_LEN / 3, 0));
        orchestrator.attach(pipeline(Green, 2 * BUF_LEN, 0));

        let report = orchestrator.fill_all()?;
        assert!(matches!(report.outcome(Red), Some(ChannelOutcome::Exhausted)));
        assert!(report.buffer(Green).is_some());
        assert_eq!(orchestrator.active_channels(), vec![Green]);

        let green = orchestrator.pipeline(Green).map(|p| *p.state());
        assert_eq!(green.map(|s| s.sample_cnt), Some(BUF_LEN as u32 % 477_750));

        let report = orchestrator.fill_all()?;
        assert!(report.outcome(Red).is_none());
        assert!(report.buffer(Green).is_some());
        assert!(!orchestrator.shutdown.load(Ordering::SeqCst));

        let report = orchestrator.fill_all()?;
        assert_eq!(report.filled_count(), 0);
        assert!(orchestrator.shutdown.load(Ordering::SeqCst));
        Ok(())
    }

    #[test]
    fn from_config_opens_every_channel() -> anyhow::Result<()> {
        use crate::structs::format::Signedness;

        let dir = std::env::temp_dir().join(format!("cvbs-orchestrate-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let red = dir.join("red.u8");
        std::fs::write(&red, vec![0u8; BUF_LEN])?;

        let mut config = PlayerConfig {
            standard: Some(VideoStandard::Ntsc),
            sample_rate: VideoStandard::Ntsc.sample_rate(),
            output_signedness: Signedness::Signed,
            read_mode: ReadMode::RedFirst,
            start_frame: 0,
            device_index: 0,
            channels: vec![ChannelConfig::for_path(Red, &red)],
            audio: None,
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut orchestrator = ChannelOrchestrator::from_config(&config, shutdown.clone())?;
        assert_eq!(orchestrator.read_mode(), ReadMode::RedFirst);
        assert_eq!(orchestrator.active_channels(), vec![Red]);

        let report = orchestrator.fill_all()?;
        assert_eq!(report.buffer(Red).map(|b| b[0]), Some(0x80));

        config.channels.push(ChannelConfig::for_path(Green, dir.join("missing.u8")));
        assert!(ChannelOrchestrator::from_config(&config, shutdown).is_err());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn shutdown_cancels_fill() {
        let shutdown = Arc::new(AtomicBool::new(true));
        let mut orchestrator = ChannelOrchestrator::new(ReadMode::Parallel, shutdown);
        orchestrator.attach(pipeline(Red, BUF_LEN, 0));

        assert!(matches!(
            orchestrator.fill_all(),
            Err(PipelineError::Cancelled { color: Red })
        ));
    }
}
