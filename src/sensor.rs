//! Sample sources feeding the ingestion thread.

pub mod device;
pub mod frame;
pub mod synthetic;

use crate::dsp::Sample;
use crate::util::signal::StopSignal;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use device::DeviceSource;
pub use synthetic::SyntheticSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open sensor device {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to configure sensor device {}", .path.display())]
    Configure {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),
    #[error("sensor read failed")]
    Io(#[from] io::Error),
    #[error("sensor stream ended")]
    Disconnected,
    #[error("sample source closed")]
    Closed,
}

/// A blocking, non-restartable stream of sensor readings.
pub trait SampleSource: Send {
    /// Block until the next reading is available.
    ///
    /// `Ok(None)` means the source produced something that was not a reading
    /// (a malformed frame) and the caller should simply ask again.
    /// [`SourceError::Closed`] is returned once [`SourceCloser::close`] has
    /// been called; every other error is fatal for the source.
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError>;

    /// Handle that interrupts a pending or future [`Self::next_sample`].
    fn closer(&self) -> SourceCloser;

    fn describe(&self) -> String;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        (**self).next_sample()
    }

    fn closer(&self) -> SourceCloser {
        (**self).closer()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Clone)]
enum CloseHandle {
    Signal(StopSignal),
    Lines(async_channel::Receiver<device::LineResult>),
}

/// Cloneable, thread-safe way to unblock a source from outside its thread.
#[derive(Debug, Clone)]
pub struct SourceCloser(CloseHandle);

impl SourceCloser {
    pub fn signal(signal: StopSignal) -> Self {
        Self(CloseHandle::Signal(signal))
    }

    pub(crate) fn lines(receiver: async_channel::Receiver<device::LineResult>) -> Self {
        Self(CloseHandle::Lines(receiver))
    }

    pub fn close(&self) {
        match &self.0 {
            CloseHandle::Signal(signal) => signal.raise(),
            CloseHandle::Lines(receiver) => {
                receiver.close();
            }
        }
    }
}
