use crate::dsp::iir::IirConfig;
use crate::dsp::motion::MotionConfig;
use crate::history::DEFAULT_CAPACITY;
use crate::sensor::device::{DEFAULT_BAUD, DEFAULT_DEVICE};
use crate::sensor::synthetic::SyntheticConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const ENV_DEVICE: &str = "PIRSCOPE_DEVICE";
pub const ENV_BAUD: &str = "PIRSCOPE_BAUD";
pub const ENV_OUTPUT: &str = "PIRSCOPE_OUTPUT";

const DEFAULT_REFRESH: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Summary lines through the log.
    #[default]
    Log,
    /// One JSON snapshot per line on stdout.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub simulate: bool,
    pub device: PathBuf,
    pub baud: u32,
    pub capacity: usize,
    pub filter: IirConfig,
    pub synthetic: SyntheticConfig,
    pub motion: MotionConfig,
    pub refresh: Duration,
    pub output: OutputFormat,
}

impl Config {
    pub fn new(simulate: bool) -> Self {
        Self {
            simulate,
            device: PathBuf::from(DEFAULT_DEVICE),
            baud: DEFAULT_BAUD,
            capacity: DEFAULT_CAPACITY,
            filter: IirConfig::default(),
            synthetic: SyntheticConfig::default(),
            motion: MotionConfig::default(),
            refresh: DEFAULT_REFRESH,
            output: OutputFormat::default(),
        }
    }

    pub fn from_env(simulate: bool) -> Self {
        Self::new(simulate).with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(device) = lookup(ENV_DEVICE).filter(|v| !v.trim().is_empty()) {
            self.device = PathBuf::from(device.trim());
        }
        if let Some(raw) = lookup(ENV_BAUD) {
            match raw.trim().parse() {
                Ok(baud) => self.baud = baud,
                Err(err) => warn!("[config] ignoring {ENV_BAUD}={raw:?}: {err}"),
            }
        }
        if let Some(raw) = lookup(ENV_OUTPUT) {
            match raw.parse() {
                Ok(format) => self.output = format,
                Err(err) => warn!("[config] ignoring {ENV_OUTPUT}: {err}"),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_env(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::new(false).with_overrides(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_sensor_setup() {
        let config = Config::new(true);
        assert!(config.simulate);
        assert_eq!(config.device, PathBuf::from("/dev/tty.usbserial"));
        assert_eq!(config.baud, 115_200);
        assert_eq!(config.capacity, 380);
        assert_eq!(config.filter.order, 8);
        assert_eq!(config.filter.response, 1);
        assert_eq!(config.motion.threshold, 4);
        assert_eq!(config.synthetic.interval, Duration::from_millis(120));
        assert_eq!(config.output, OutputFormat::Log);
    }

    #[test]
    fn environment_overrides_apply() {
        let config = with_env(&[
            (ENV_DEVICE, "/dev/ttyUSB0"),
            (ENV_BAUD, "57600"),
            (ENV_OUTPUT, "JSON"),
        ]);
        assert_eq!(config.device, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.baud, 57_600);
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let config = with_env(&[(ENV_DEVICE, "  "), (ENV_BAUD, "fast"), (ENV_OUTPUT, "xml")]);
        assert_eq!(config.device, PathBuf::from(DEFAULT_DEVICE));
        assert_eq!(config.baud, DEFAULT_BAUD);
        assert_eq!(config.output, OutputFormat::Log);
    }
}
