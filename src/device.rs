use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use cvbs::structs::config::Color;
use cvbs::utils::device::{DeviceSink, PullCallback, PullRequest, buffer_period};
use cvbs::utils::errors::DeviceError;
use log::{debug, error, info, trace};

/// Highest rate the emulated DAC accepts, in Hz.
const MAX_SAMPLE_RATE: u32 = 165_000_000;

/// A DAC stand-in that pulls one buffer set per buffer period.
///
/// Transfers are paced in real time at the configured rate. With a dump directory the
/// transmitted streams land in `<dir>/<color>.s8` (or `.u8`), otherwise they are dropped.
pub struct EmulatedDevice {
    index: u32,
    sample_rate: u32,
    sample_signed: bool,
    dump_dir: Option<PathBuf>,
    running: Arc<AtomicBool>,
    transfers: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl EmulatedDevice {
    pub fn set_sample_signed(&mut self, signed: bool) {
        self.sample_signed = signed;
    }

    /// Write every transmitted buffer below `dir`.
    pub fn dump_to(&mut self, dir: &Path) -> Result<(), DeviceError> {
        fs::create_dir_all(dir)?;
        info!("Dumping transmitted streams to {}", dir.display());
        self.dump_dir = Some(dir.to_path_buf());
        Ok(())
    }

    /// Transfers completed so far.
    pub fn transfers(&self) -> u64 {
        self.transfers.load(Ordering::Relaxed)
    }
}

impl DeviceSink for EmulatedDevice {
    fn open(index: u32) -> Result<Self, DeviceError> {
        if index != 0 {
            return Err(DeviceError::NotFound(index));
        }

        debug!("Opened emulated device #{index}");
        Ok(Self {
            index,
            sample_rate: 0,
            sample_signed: true,
            dump_dir: None,
            running: Arc::new(AtomicBool::new(false)),
            transfers: Arc::new(AtomicU64::new(0)),
            worker: None,
        })
    }

    fn set_sample_rate(&mut self, rate: u32) -> Result<u32, DeviceError> {
        if rate == 0 || rate > MAX_SAMPLE_RATE {
            return Err(DeviceError::SampleRate(rate));
        }
        self.sample_rate = rate;
        Ok(rate)
    }

    fn start(&mut self, mut callback: PullCallback) -> Result<(), DeviceError> {
        if self.worker.is_some() {
            return Err(DeviceError::AlreadyStarted);
        }
        if self.sample_rate == 0 {
            return Err(DeviceError::SampleRate(0));
        }

        let period = buffer_period(self.sample_rate);
        let sample_signed = self.sample_signed;
        let mut dump = self.dump_dir.clone().map(|dir| StreamDump::new(dir, sample_signed));
        let running = self.running.clone();
        let transfers = self.transfers.clone();

        running.store(true, Ordering::SeqCst);
        self.worker = Some(thread::spawn(move || {
            let mut device_error = false;
            let mut deadline = Instant::now();

            while running.load(Ordering::SeqCst) {
                let mut request = PullRequest::new(device_error, sample_signed);
                callback(&mut request);

                if let Some(dump) = dump.as_mut() {
                    if let Err(e) = dump.write(&mut request) {
                        error!("Transfer failed: {e}");
                        device_error = true;
                    }
                }
                let count = transfers.fetch_add(1, Ordering::Relaxed) + 1;
                trace!("Transfer {count} done");

                deadline += period;
                match deadline.checked_duration_since(Instant::now()) {
                    Some(wait) => thread::sleep(wait),
                    None => deadline = Instant::now(),
                }
            }

            if let Some(mut dump) = dump {
                if let Err(e) = dump.flush() {
                    error!("Failed to flush dump: {e}");
                }
            }
        }));

        info!(
            "Device #{} started at {} Hz ({} samples)",
            self.index,
            self.sample_rate,
            if sample_signed { "signed" } else { "unsigned" }
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.running.store(false, Ordering::SeqCst);
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| DeviceError::Transfer),
            None => Ok(()),
        }
    }

    fn close(mut self) -> Result<(), DeviceError> {
        self.stop()?;
        debug!(
            "Closed emulated device #{} after {} transfers",
            self.index,
            self.transfers()
        );
        Ok(())
    }
}

/// Per-channel files receiving the transmitted streams.
struct StreamDump {
    dir: PathBuf,
    extension: &'static str,
    writers: HashMap<Color, BufWriter<File>>,
}

impl StreamDump {
    fn new(dir: PathBuf, sample_signed: bool) -> Self {
        Self {
            dir,
            extension: if sample_signed { "s8" } else { "u8" },
            writers: HashMap::new(),
        }
    }

    fn write(&mut self, request: &mut PullRequest) -> std::io::Result<()> {
        for color in Color::ALL {
            let Some(buffer) = request.take_buffer(color) else {
                continue;
            };

            let writer = match self.writers.entry(color) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let path = self.dir.join(format!("{}.{}", color.name(), self.extension));
                    entry.insert(BufWriter::new(File::create(path)?))
                }
            };
            writer.write_all(&buffer)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writers.values_mut().try_for_each(|writer| writer.flush())
    }
}
