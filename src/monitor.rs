//! Headless consumer of the shared history.
//!
//! Stands where a plotting front end would: it only ever reads snapshots,
//! feeds the fresh part through the motion detector, and reports.

use crate::config::OutputFormat;
use crate::dsp::motion::{MotionConfig, MotionDetector, MotionEvent};
use crate::history::{HistorySnapshot, SampleHistory};
use crate::util::signal::StopSignal;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Serialize)]
struct SnapshotLine<'a> {
    #[serde(flatten)]
    snapshot: &'a HistorySnapshot,
    motion: Vec<u16>,
}

pub struct Monitor<W: Write> {
    history: Arc<SampleHistory>,
    detector: MotionDetector,
    format: OutputFormat,
    out: W,
    seen: u64,
    motion_events: u64,
}

impl<W: Write> Monitor<W> {
    pub fn new(
        history: Arc<SampleHistory>,
        motion: MotionConfig,
        format: OutputFormat,
        out: W,
    ) -> Self {
        Self {
            history,
            detector: MotionDetector::new(motion),
            format,
            out,
            seen: 0,
            motion_events: 0,
        }
    }

    pub fn motion_events(&self) -> u64 {
        self.motion_events
    }

    /// Take one snapshot and report whatever arrived since the last one.
    pub fn refresh(&mut self) -> io::Result<Vec<MotionEvent>> {
        let snapshot = self.history.snapshot();
        if snapshot.sequence == self.seen {
            return Ok(Vec::new());
        }

        let events: Vec<MotionEvent> = snapshot
            .since(self.seen)
            .filter_map(|reading| self.detector.observe(reading.diff))
            .collect();
        self.seen = snapshot.sequence;
        self.motion_events += events.len() as u64;

        match self.format {
            OutputFormat::Log => {
                if let Some(latest) = snapshot.latest() {
                    info!(
                        "[monitor] #{} raw={} filtered={} diff={}",
                        snapshot.sequence, latest.raw, latest.filtered, latest.diff
                    );
                }
                for event in &events {
                    info!("[monitor] motion detected (diff {})", event.magnitude);
                }
            }
            OutputFormat::Json => {
                let line = SnapshotLine {
                    snapshot: &snapshot,
                    motion: events.iter().map(|e| e.magnitude).collect(),
                };
                serde_json::to_writer(&mut self.out, &line)?;
                self.out.write_all(b"\n")?;
                self.out.flush()?;
            }
        }

        Ok(events)
    }

    /// Refresh every `interval` until `shutdown` is raised or `finished`
    /// reports that the producer has gone away.
    pub fn run(
        &mut self,
        shutdown: &StopSignal,
        interval: Duration,
        finished: impl Fn() -> bool,
    ) -> io::Result<()> {
        loop {
            self.refresh()?;
            if finished() {
                // One last look so the final readings are not lost.
                self.refresh()?;
                return Ok(());
            }
            if shutdown.wait_timeout(interval) {
                return Ok(());
            }
        }
    }
}
