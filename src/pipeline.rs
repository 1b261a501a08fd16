//! Ingestion thread: source -> filter -> history.

use crate::dsp::iir::IirFilter;
use crate::history::SampleHistory;
use crate::sensor::{SampleSource, SourceCloser, SourceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, info, trace};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("sample source failed after {pushed} readings")]
    Source {
        pushed: u64,
        #[source]
        source: SourceError,
    },
    #[error("ingestion thread panicked")]
    Panicked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub pushed: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Pushed,
    Skipped,
}

/// Pull one sample through the filter into the history. A skipped frame
/// touches neither the filter nor the history.
fn ingest_step<S: SampleSource + ?Sized>(
    source: &mut S,
    filter: &mut IirFilter,
    history: &SampleHistory,
) -> Result<Step, SourceError> {
    let Some(raw) = source.next_sample()? else {
        return Ok(Step::Skipped);
    };

    let out = filter.transform(raw);
    trace!(
        "[ingest] raw={raw} acc={} filtered={} diff={}",
        filter.state().accumulator,
        out.filtered,
        out.diff
    );
    history.push(raw, out.filtered, out.diff);
    Ok(Step::Pushed)
}

fn ingest_loop<S: SampleSource>(
    mut source: S,
    mut filter: IirFilter,
    history: Arc<SampleHistory>,
    stop: Arc<AtomicBool>,
) -> Result<IngestReport, IngestError> {
    let mut report = IngestReport::default();

    while !stop.load(Ordering::Acquire) {
        match ingest_step(&mut source, &mut filter, &history) {
            Ok(Step::Pushed) => report.pushed += 1,
            Ok(Step::Skipped) => report.skipped += 1,
            Err(SourceError::Closed) if stop.load(Ordering::Acquire) => break,
            Err(err) => {
                error!("[ingest] source lost, stopping: {err}");
                return Err(IngestError::Source {
                    pushed: report.pushed,
                    source: err,
                });
            }
        }
    }

    info!(
        "[ingest] stopped after {} readings ({} skipped frames)",
        report.pushed, report.skipped
    );
    Ok(report)
}

/// Owns the ingestion thread. The history is shared; the source and filter
/// move onto the thread and are never seen again from outside.
#[derive(Debug)]
pub struct Pipeline {
    history: Arc<SampleHistory>,
    stop: Arc<AtomicBool>,
    closer: SourceCloser,
    handle: Option<JoinHandle<Result<IngestReport, IngestError>>>,
}

impl Pipeline {
    pub fn spawn<S>(
        source: S,
        filter: IirFilter,
        history: Arc<SampleHistory>,
    ) -> std::io::Result<Self>
    where
        S: SampleSource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let closer = source.closer();
        info!("[ingest] starting on {}", source.describe());

        let handle = {
            let history = Arc::clone(&history);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("pirscope-ingest".into())
                .spawn(move || ingest_loop(source, filter, history, stop))?
        };

        Ok(Self {
            history,
            stop,
            closer,
            handle: Some(handle),
        })
    }

    pub fn history(&self) -> Arc<SampleHistory> {
        Arc::clone(&self.history)
    }

    /// True once the ingestion thread has returned, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request a stop, interrupt the source, and wait for the thread. No
    /// pushes happen after this returns.
    pub fn stop(mut self) -> Result<IngestReport, IngestError> {
        self.request_stop();
        self.join_thread()
    }

    /// Wait for the thread to end on its own (source loss).
    pub fn join(mut self) -> Result<IngestReport, IngestError> {
        self.join_thread()
    }

    fn request_stop(&self) {
        debug!("[ingest] stop requested");
        self.stop.store(true, Ordering::Release);
        self.closer.close();
    }

    fn join_thread(&mut self) -> Result<IngestReport, IngestError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| IngestError::Panicked)?,
            None => Ok(IngestReport::default()),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_stop();
            let _ = self.join_thread();
        }
    }
}
