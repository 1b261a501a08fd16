//! Serial-attached sensor reading `PIR,ddd` frames.
//!
//! Reads block on the device, so they run on their own thread and hand whole
//! lines over a bounded channel. Closing the channel is what lets a stop
//! request get through while the device is silent.

use super::frame::parse_frame;
use super::{SampleSource, SourceCloser, SourceError};
use crate::dsp::Sample;
use async_channel::{Receiver, Sender};
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, OFlag};
use nix::sys::termios::{self, BaudRate, SetArg};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::thread;
use tracing::{debug, info, warn};

pub const DEFAULT_DEVICE: &str = "/dev/tty.usbserial";
pub const DEFAULT_BAUD: u32 = 115_200;

const LINE_QUEUE_CAPACITY: usize = 64;
// Anything longer cannot be a frame; the rest of it is discarded up to the
// next newline and the whole line counts as one malformed frame.
const MAX_LINE_BYTES: u64 = 256;

#[derive(Debug)]
pub(crate) enum Line {
    Complete(Vec<u8>),
    /// First `MAX_LINE_BYTES` of a line that had no newline within them.
    Overlong(Vec<u8>),
}

pub(crate) type LineResult = io::Result<Line>;

#[derive(Debug)]
pub struct DeviceSource {
    name: String,
    lines: Receiver<LineResult>,
}

impl DeviceSource {
    /// Open a serial device, switch it to raw mode at `baud`, and start
    /// reading. Paths that are not terminals are read as-is.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<Self, SourceError> {
        let path = path.as_ref();
        // Non-blocking so a modem-control line cannot hang the open itself.
        let file = OpenOptions::new()
            .read(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(path)
            .map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        configure_line(&file, path, baud)?;
        set_blocking(&file).map_err(|source| SourceError::Configure {
            path: path.to_path_buf(),
            source,
        })?;

        let source = Self::from_reader(path.display().to_string(), file)?;
        info!("[device] serial interface started on {}", source.name);
        Ok(source)
    }

    pub fn from_reader<R>(name: impl Into<String>, reader: R) -> Result<Self, SourceError>
    where
        R: Read + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = async_channel::bounded(LINE_QUEUE_CAPACITY);
        thread::Builder::new()
            .name("pirscope-device-reader".into())
            .spawn(move || read_lines(BufReader::new(reader), sender))?;

        Ok(Self {
            name,
            lines: receiver,
        })
    }
}

impl SampleSource for DeviceSource {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        match self.lines.recv_blocking() {
            Ok(Ok(Line::Overlong(head))) => {
                debug!(
                    "[device] skipping overlong line starting {:?}",
                    String::from_utf8_lossy(&head[..head.len().min(16)])
                );
                Ok(None)
            }
            Ok(Ok(Line::Complete(line))) => match parse_frame(&line) {
                Ok(sample) => Ok(Some(sample)),
                Err(err) => {
                    debug!(
                        "[device] skipping frame {:?}: {err}",
                        String::from_utf8_lossy(&line).trim_end()
                    );
                    Ok(None)
                }
            },
            Ok(Err(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(SourceError::Disconnected)
            }
            Ok(Err(err)) => Err(SourceError::Io(err)),
            Err(_) => Err(SourceError::Closed),
        }
    }

    fn closer(&self) -> SourceCloser {
        SourceCloser::lines(self.lines.clone())
    }

    fn describe(&self) -> String {
        format!("device {}", self.name)
    }
}

fn read_lines<R: BufRead>(mut reader: R, sender: Sender<LineResult>) {
    let mut line = Vec::new();
    loop {
        line.clear();
        let result = match (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut line) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "sensor stream ended",
            )),
            Ok(read) if read as u64 == MAX_LINE_BYTES && line.last() != Some(&b'\n') => reader
                .skip_until(b'\n')
                .map(|_| Line::Overlong(std::mem::take(&mut line))),
            Ok(_) => Ok(Line::Complete(std::mem::take(&mut line))),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => Err(err),
        };

        let fatal = result.is_err();
        if sender.send_blocking(result).is_err() {
            debug!("[device] line channel closed; reader exiting");
            return;
        }
        if fatal {
            return;
        }
    }
}

fn configure_line(file: &File, path: &Path, baud: u32) -> Result<(), SourceError> {
    let rate = baud_rate(baud)?;
    let configure_err = |source: Errno| SourceError::Configure {
        path: path.to_path_buf(),
        source,
    };

    let mut attrs = match termios::tcgetattr(file) {
        Ok(attrs) => attrs,
        Err(Errno::ENOTTY) => {
            warn!(
                "[device] {} is not a terminal; reading without line setup",
                path.display()
            );
            return Ok(());
        }
        Err(err) => return Err(configure_err(err)),
    };

    termios::cfmakeraw(&mut attrs);
    termios::cfsetspeed(&mut attrs, rate).map_err(configure_err)?;
    termios::tcsetattr(file, SetArg::TCSANOW, &attrs).map_err(configure_err)?;
    debug!("[device] {} set to raw mode at {baud} baud", path.display());
    Ok(())
}

/// Clear `O_NONBLOCK` so the reader thread parks in `read()`.
fn set_blocking(file: &File) -> nix::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl::fcntl(file, FcntlArg::F_GETFL)?);
    fcntl::fcntl(file, FcntlArg::F_SETFL(flags & !OFlag::O_NONBLOCK))?;
    Ok(())
}

fn baud_rate(baud: u32) -> Result<BaudRate, SourceError> {
    Ok(match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        other => return Err(SourceError::UnsupportedBaud(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn drain(source: &mut DeviceSource) -> (Vec<Option<Sample>>, SourceError) {
        let mut seen = Vec::new();
        loop {
            match source.next_sample() {
                Ok(sample) => seen.push(sample),
                Err(err) => return (seen, err),
            }
        }
    }

    /// Reader that never yields data until its sender is dropped.
    struct Silent(mpsc::Receiver<()>);

    impl Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn yields_samples_and_skips_malformed_lines() {
        let input = b"PIR,300\nPIR,301\r\nnoise\nPIR,\nPIR,302\n".to_vec();
        let mut source = DeviceSource::from_reader("cursor", Cursor::new(input)).unwrap();

        let (seen, err) = drain(&mut source);
        assert_eq!(seen, vec![Some(300), Some(301), None, None, Some(302)]);
        assert!(matches!(err, SourceError::Disconnected), "got {err:?}");
    }

    #[test]
    fn overlong_lines_are_skipped() {
        let mut input = vec![b'7'; 1_000];
        input.extend_from_slice(b"\nPIR,042\n");
        let mut source = DeviceSource::from_reader("cursor", Cursor::new(input)).unwrap();

        let (seen, err) = drain(&mut source);
        assert_eq!(seen, vec![None, Some(42)]);
        assert!(matches!(err, SourceError::Disconnected), "got {err:?}");
    }

    #[test]
    fn frame_after_overlong_prefix_is_not_accepted() {
        let mut input = vec![b'x'; MAX_LINE_BYTES as usize];
        input.extend_from_slice(b"PIR,123\nPIR,124\n");
        let mut source = DeviceSource::from_reader("cursor", Cursor::new(input)).unwrap();

        let (seen, err) = drain(&mut source);
        assert_eq!(seen, vec![None, Some(124)]);
        assert!(matches!(err, SourceError::Disconnected), "got {err:?}");
    }

    #[test]
    fn overlong_line_cut_by_eof_is_one_malformed_frame() {
        let input = vec![b'7'; MAX_LINE_BYTES as usize + 10];
        let mut source = DeviceSource::from_reader("cursor", Cursor::new(input)).unwrap();

        let (seen, err) = drain(&mut source);
        assert_eq!(seen, vec![None]);
        assert!(matches!(err, SourceError::Disconnected), "got {err:?}");
    }

    #[test]
    fn line_of_exactly_the_limit_is_still_a_line() {
        let mut input = b"PIR,077".to_vec();
        input.resize(MAX_LINE_BYTES as usize - 1, b' ');
        input.extend_from_slice(b"\nPIR,078\n");
        let mut source = DeviceSource::from_reader("cursor", Cursor::new(input)).unwrap();

        let (seen, _) = drain(&mut source);
        assert_eq!(seen, vec![Some(77), Some(78)]);
    }

    #[test]
    fn reads_frames_from_a_plain_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"PIR,310\nPIR,320\n").unwrap();
        file.flush().unwrap();

        let mut source = DeviceSource::open(file.path(), DEFAULT_BAUD).unwrap();
        let (seen, err) = drain(&mut source);
        assert_eq!(seen, vec![Some(310), Some(320)]);
        assert!(matches!(err, SourceError::Disconnected));
    }

    #[test]
    fn set_blocking_clears_nonblocking_flag() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(temp.path())
            .unwrap();
        let flags = |file: &File| {
            OFlag::from_bits_truncate(fcntl::fcntl(file, FcntlArg::F_GETFL).unwrap())
        };
        assert!(flags(&file).contains(OFlag::O_NONBLOCK));

        set_blocking(&file).unwrap();
        assert!(!flags(&file).contains(OFlag::O_NONBLOCK));
    }

    #[test]
    fn missing_device_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeviceSource::open(dir.path().join("ttyNOPE"), DEFAULT_BAUD).unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }), "got {err:?}");
    }

    #[test]
    fn unsupported_baud_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = DeviceSource::open(file.path(), 12_345).unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedBaud(12_345)));
    }

    #[test]
    fn closer_interrupts_a_blocked_read() {
        let (_keep_blocked, rx) = mpsc::channel();
        let mut source = DeviceSource::from_reader("silent", Silent(rx)).unwrap();
        let closer = source.closer();

        let reader = thread::spawn(move || {
            let started = Instant::now();
            (source.next_sample(), started.elapsed())
        });
        thread::sleep(Duration::from_millis(50));
        closer.close();

        let (result, waited) = reader.join().unwrap();
        assert!(matches!(result, Err(SourceError::Closed)), "got {result:?}");
        assert!(waited < Duration::from_secs(5));
    }
}
