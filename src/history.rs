//! Bounded, lock-guarded history of raw/filtered/diff readings shared between
//! the ingestion thread and whoever draws them.

use crate::dsp::Sample;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 380;

/// One ingested sample together with what the filter made of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub raw: Sample,
    pub filtered: u16,
    pub diff: u16,
}

impl Reading {
    pub const fn new(raw: Sample, filtered: u16, diff: u16) -> Self {
        Self { raw, filtered, diff }
    }
}

#[derive(Debug)]
struct Series {
    readings: VecDeque<Reading>,
    capacity: usize,
    pushed: u64,
}

/// Fixed-capacity FIFO of readings. All three series live in one deque of
/// triples behind one lock, so they cannot drift apart.
#[derive(Debug)]
pub struct SampleHistory {
    inner: Mutex<Series>,
}

impl SampleHistory {
    /// Empty history that grows to `capacity` before it starts evicting.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Series {
                readings: VecDeque::with_capacity(capacity),
                capacity,
                pushed: 0,
            }),
        }
    }

    /// History already holding `capacity` zero readings, so a reader that
    /// arrives before the first sample still sees a full-width view.
    pub fn prefilled(capacity: usize) -> Self {
        let history = Self::with_capacity(capacity);
        {
            let mut series = history.inner.lock();
            let capacity = series.capacity;
            series.readings.resize(capacity, Reading::default());
        }
        history
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().readings.is_empty()
    }

    /// Total number of readings pushed since construction (prefill excluded).
    pub fn pushed(&self) -> u64 {
        self.inner.lock().pushed
    }

    pub fn push(&self, raw: Sample, filtered: u16, diff: u16) {
        self.push_reading(Reading::new(raw, filtered, diff));
    }

    pub fn push_reading(&self, reading: Reading) {
        let mut series = self.inner.lock();
        if series.readings.len() == series.capacity {
            series.readings.pop_front();
        }
        series.readings.push_back(reading);
        series.pushed += 1;
    }

    pub fn latest(&self) -> Option<Reading> {
        self.inner.lock().readings.back().copied()
    }

    /// Copy the current contents, oldest first. The lock is held for the copy
    /// only; splitting into series happens after it is released.
    pub fn snapshot(&self) -> HistorySnapshot {
        let (readings, sequence) = {
            let series = self.inner.lock();
            let (head, tail) = series.readings.as_slices();
            let mut readings = Vec::with_capacity(head.len() + tail.len());
            readings.extend_from_slice(head);
            readings.extend_from_slice(tail);
            (readings, series.pushed)
        };
        HistorySnapshot::from_readings(&readings, sequence)
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::prefilled(DEFAULT_CAPACITY)
    }
}

/// Point-in-time copy of the history, one vector per series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistorySnapshot {
    /// Readings pushed before this snapshot was taken.
    pub sequence: u64,
    pub raw: Vec<Sample>,
    pub filtered: Vec<u16>,
    pub diff: Vec<u16>,
}

impl HistorySnapshot {
    fn from_readings(readings: &[Reading], sequence: u64) -> Self {
        let mut snapshot = Self {
            sequence,
            raw: Vec::with_capacity(readings.len()),
            filtered: Vec::with_capacity(readings.len()),
            diff: Vec::with_capacity(readings.len()),
        };
        for reading in readings {
            snapshot.raw.push(reading.raw);
            snapshot.filtered.push(reading.filtered);
            snapshot.diff.push(reading.diff);
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn reading(&self, index: usize) -> Option<Reading> {
        Some(Reading::new(
            *self.raw.get(index)?,
            *self.filtered.get(index)?,
            *self.diff.get(index)?,
        ))
    }

    pub fn latest(&self) -> Option<Reading> {
        self.len().checked_sub(1).and_then(|i| self.reading(i))
    }

    /// Readings pushed after `seen`, oldest first. Entries already evicted
    /// are skipped.
    pub fn since(&self, seen: u64) -> impl Iterator<Item = Reading> + '_ {
        let fresh = self.sequence.saturating_sub(seen);
        let fresh = usize::try_from(fresh).unwrap_or(usize::MAX).min(self.len());
        (self.len() - fresh..self.len()).filter_map(|i| self.reading(i))
    }
}
