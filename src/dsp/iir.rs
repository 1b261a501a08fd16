//! Single-pole integer IIR smoother with a rectified-difference output.
//!
//! The accumulator is kept scaled by the filter order so that sub-unit
//! precision survives between calls without floating point:
//!
//! ```text
//! acc'     = (N*m*s + (N-m)*acc) / N
//! filtered = ceil(acc' / N)
//! diff     = |filtered - previous filtered|
//! ```
//!
//! Under constant input `acc` climbs toward `N*s` (stopping within `N-1` of
//! it, since the division floors) and `filtered` settles on `s`. Every step
//! closes `m/N` of the remaining gap.

use super::Sample;

pub const DEFAULT_ORDER: u32 = 8;
pub const DEFAULT_RESPONSE: u32 = 1;
pub const MAX_ORDER: u32 = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IirConfig {
    /// Filter order `N`; the accumulator is scaled by this factor.
    pub order: u32,
    /// Weight `m` given to the newest sample against `N - m` for history.
    pub response: u32,
}

impl Default for IirConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            response: DEFAULT_RESPONSE,
        }
    }
}

impl IirConfig {
    fn normalized(mut self) -> Self {
        self.order = self.order.clamp(1, MAX_ORDER);
        self.response = self.response.clamp(1, self.order);
        self
    }
}

/// Fixed-point memory of the filter. Owned by the ingestion thread only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterState {
    pub accumulator: u32,
    pub last_output: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOutput {
    pub filtered: u16,
    pub diff: u16,
}

/// Advance `state` by one sample. Pure; the caller decides where the new
/// state lives.
pub fn step(config: IirConfig, state: FilterState, sample: Sample) -> (FilterState, FilterOutput) {
    let n = u64::from(config.order);
    let m = u64::from(config.response);
    let acc = u64::from(state.accumulator);

    let next_acc = (n * m * u64::from(sample) + (n - m) * acc) / n;
    let filtered = (next_acc + n - 1) / n;

    // Bounded by `order * Sample::MAX` and `Sample::MAX` respectively.
    let accumulator = u32::try_from(next_acc).unwrap_or(u32::MAX);
    let filtered = u16::try_from(filtered).unwrap_or(u16::MAX);

    (
        FilterState {
            accumulator,
            last_output: filtered,
        },
        FilterOutput {
            filtered,
            diff: filtered.abs_diff(state.last_output),
        },
    )
}

#[derive(Debug, Clone)]
pub struct IirFilter {
    config: IirConfig,
    state: FilterState,
}

impl Default for IirFilter {
    fn default() -> Self {
        Self::new(IirConfig::default())
    }
}

impl IirFilter {
    pub fn new(config: IirConfig) -> Self {
        Self {
            config: config.normalized(),
            state: FilterState::default(),
        }
    }

    pub fn config(&self) -> IirConfig {
        self.config
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn transform(&mut self, sample: Sample) -> FilterOutput {
        let (state, output) = step(self.config, self.state, sample);
        self.state = state;
        output
    }
}
