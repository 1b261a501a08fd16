//! Random-walk stand-in for the sensor, paced like the real firmware.

use super::{SampleSource, SourceCloser, SourceError};
use crate::dsp::Sample;
use crate::util::signal::StopSignal;
use std::time::Duration;
use tracing::trace;

pub const DEFAULT_BASELINE: u16 = 300;
pub const DEFAULT_CEILING: i32 = 50;
pub const DEFAULT_STEP: i32 = 3;
/// The sensor reports at roughly 8 Hz.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub baseline: u16,
    /// Upper clamp for the walk offset. There is no lower clamp; negative
    /// offsets are folded upward around the baseline.
    pub ceiling: i32,
    /// Largest per-tick move in either direction.
    pub step: i32,
    pub interval: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            baseline: DEFAULT_BASELINE,
            ceiling: DEFAULT_CEILING,
            step: DEFAULT_STEP,
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug)]
pub struct SyntheticSource {
    config: SyntheticConfig,
    current: i32,
    rng: fastrand::Rng,
    pacer: StopSignal,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self::with_rng(config, fastrand::Rng::new())
    }

    pub fn with_rng(config: SyntheticConfig, rng: fastrand::Rng) -> Self {
        Self {
            config: SyntheticConfig {
                step: config.step.max(0),
                ..config
            },
            current: 0,
            rng,
            pacer: StopSignal::new(),
        }
    }

    /// Advance the walk by one tick without pacing.
    fn advance(&mut self) -> Sample {
        let step = self.config.step;
        self.current = self
            .current
            .saturating_add(self.rng.i32(-step..=step))
            .min(self.config.ceiling);

        let offset = self.current.unsigned_abs();
        let value = u32::from(self.config.baseline).saturating_add(offset);
        Sample::try_from(value).unwrap_or(Sample::MAX)
    }
}

impl SampleSource for SyntheticSource {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        if self.pacer.wait_timeout(self.config.interval) {
            return Err(SourceError::Closed);
        }

        let sample = self.advance();
        trace!("[synthetic] walk offset {} -> {sample}", self.current);
        Ok(Some(sample))
    }

    fn closer(&self) -> SourceCloser {
        SourceCloser::signal(self.pacer.clone())
    }

    fn describe(&self) -> String {
        format!(
            "synthetic walk around {} every {} ms",
            self.config.baseline,
            self.config.interval.as_millis()
        )
    }
}
