//! Delay estimate value type.

/// Quality level of a delay estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayEstimateQuality {
    /// Reported before the lag histogram has converged.
    Coarse,
    /// Reported once a lag has been selected often enough to be reliable.
    Refined,
}

/// Whether an estimate reports a new delay or confirms the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayChange {
    NewlyDetected,
    Reaffirmed,
}

/// A delay estimate together with its confidence.
///
/// The echo path delay estimator reports `delay` in native-rate samples;
/// the render delay controller reports it in native blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEstimate {
    pub quality: DelayEstimateQuality,
    pub delay: usize,
    /// Normalized correlation at the reported lag, in `0.0..=1.0`.
    pub confidence: f32,
    pub change: DelayChange,
    pub blocks_since_last_change: usize,
    pub blocks_since_last_update: usize,
}

impl DelayEstimate {
    pub fn new(quality: DelayEstimateQuality, delay: usize, confidence: f32) -> Self {
        Self {
            quality,
            delay,
            confidence,
            change: DelayChange::NewlyDetected,
            blocks_since_last_change: 0,
            blocks_since_last_update: 0,
        }
    }

    pub fn is_newly_detected(&self) -> bool {
        self.change == DelayChange::NewlyDetected
    }
}
