//! Edge-triggered motion detection over the rectified difference.

pub const DEFAULT_THRESHOLD: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionConfig {
    /// Smallest rectified difference counted as motion.
    pub threshold: u16,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionEvent {
    /// Rectified difference that tripped the detector.
    pub magnitude: u16,
}

/// Raises one event per excursion above the threshold; re-arms once the
/// difference drops back below it.
#[derive(Debug, Clone)]
pub struct MotionDetector {
    config: MotionConfig,
    active: bool,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config: MotionConfig {
                threshold: config.threshold.max(1),
            },
            active: false,
        }
    }

    pub fn threshold(&self) -> u16 {
        self.config.threshold
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one rectified difference; returns an event on the rising edge.
    pub fn observe(&mut self, diff: u16) -> Option<MotionEvent> {
        let above = diff >= self.config.threshold;
        let rising = above && !self.active;
        self.active = above;
        rising.then_some(MotionEvent { magnitude: diff })
    }
}
