//! Interface to the DAC device that consumes channel buffers.
//!
//! The device owns the transfer loop and calls back for one buffer per active channel
//! each time it needs more data. The USB transport behind it lives outside this crate.

use std::ops::Deref;
use std::time::Duration;

use crate::process::BUF_LEN;
use crate::structs::config::Color;
use crate::utils::errors::DeviceError;

/// One channel's worth of samples for a single device transfer.
///
/// Always [`BUF_LEN`] bytes. Ownership moves to the device on hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer(Vec<u8>);

impl Buffer {
    pub(crate) fn from_vec(data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), BUF_LEN);
        Self(data)
    }
}

impl TryFrom<Vec<u8>> for Buffer {
    type Error = Vec<u8>;

    /// Accepts exactly [`BUF_LEN`] bytes and hands anything else back.
    fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
        if data.len() == BUF_LEN {
            Ok(Self(data))
        } else {
            Err(data)
        }
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A buffer pull, filled in by the callback.
#[derive(Debug, Default)]
pub struct PullRequest {
    /// Set by the device when the previous transfer failed.
    pub device_error: bool,
    /// Sample type of the handed-over buffers.
    pub sample_signed: bool,
    buffers: [Option<Buffer>; 3],
}

impl PullRequest {
    pub fn new(device_error: bool, sample_signed: bool) -> Self {
        Self {
            device_error,
            sample_signed,
            buffers: Default::default(),
        }
    }

    pub fn set_buffer(&mut self, color: Color, buffer: Buffer) {
        self.buffers[color.index()] = Some(buffer);
    }

    pub fn take_buffer(&mut self, color: Color) -> Option<Buffer> {
        self.buffers[color.index()].take()
    }

    pub fn has_buffers(&self) -> bool {
        self.buffers.iter().any(Option::is_some)
    }
}

pub type PullCallback = Box<dyn FnMut(&mut PullRequest) + Send>;

/// A DAC that pulls buffers through a callback.
pub trait DeviceSink: Sized {
    fn open(index: u32) -> Result<Self, DeviceError>;

    /// Request `rate` samples per second; returns the rate actually configured.
    fn set_sample_rate(&mut self, rate: u32) -> Result<u32, DeviceError>;

    /// Begin transfers. `callback` runs once per buffer period on the device's thread.
    fn start(&mut self, callback: PullCallback) -> Result<(), DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError>;

    fn close(self) -> Result<(), DeviceError>;
}

/// Playback time of one buffer at `rate`.
pub fn buffer_period(rate: u32) -> Duration {
    Duration::from_secs_f64(BUF_LEN as f64 / rate.max(1) as f64)
}

#[test]
fn buffer_period_at_ntsc() {
    let period = buffer_period(crate::standard::NTSC_SAMPLE_RATE);
    assert_eq!(period.as_millis(), 91);
}

#[test]
fn pull_request_slots() {
    let mut request = PullRequest::default();
    assert!(!request.has_buffers());

    request.set_buffer(Color::Green, Buffer::from_vec(vec![0; BUF_LEN]));
    assert!(Buffer::try_from(vec![0; 16]).is_err());
    assert!(request.has_buffers());
    assert!(request.take_buffer(Color::Red).is_none());
    assert_eq!(request.take_buffer(Color::Green).map(|b| b.len()), Some(BUF_LEN));
}
