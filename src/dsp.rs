pub mod iir;
pub mod motion;

/// Raw sensor reading as delivered by a sample source.
///
/// Readings are unsigned: the frame format carries at most three decimal
/// digits and the synthetic walk emits `baseline + |offset|`.
pub type Sample = u16;
