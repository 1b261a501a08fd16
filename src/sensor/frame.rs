//! `PIR,ddd` line framing used by the sensor firmware.

use crate::dsp::Sample;
use thiserror::Error;

pub const FRAME_PREFIX: &[u8] = b"PIR,";
pub const MAX_DIGITS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty line")]
    Empty,
    #[error("missing `PIR,` prefix")]
    MissingPrefix,
    #[error("expected 1-3 digits, found {0:?}")]
    InvalidField(String),
}

/// Extract the reading from one line, with or without its terminator.
pub fn parse_frame(line: &[u8]) -> Result<Sample, FrameError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Err(FrameError::Empty);
    }

    let field = line
        .strip_prefix(FRAME_PREFIX)
        .ok_or(FrameError::MissingPrefix)?;

    if field.is_empty() || field.len() > MAX_DIGITS || !field.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidField(
            String::from_utf8_lossy(field).into_owned(),
        ));
    }

    Ok(field
        .iter()
        .fold(0, |acc: Sample, &digit| acc * 10 + Sample::from(digit - b'0')))
}
