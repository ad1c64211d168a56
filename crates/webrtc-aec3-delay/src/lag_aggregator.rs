//! Histogram aggregation of per-block correlation lags.

use crate::common::LAG_HISTORY_SIZE;
use crate::config::DelaySelectionThresholds;
use crate::delay_estimate::DelayEstimateQuality;

/// Combines the noisy per-block lags into one stable lag by tracking how often
/// each lag won over the last [`LAG_HISTORY_SIZE`] blocks.
#[derive(Debug)]
pub(crate) struct LagAggregator {
    histogram: Vec<usize>,
    history: Vec<Option<usize>>,
    history_index: usize,
    thresholds: DelaySelectionThresholds,
    significant_candidate_found: bool,
}

impl LagAggregator {
    pub(crate) fn new(num_lags: usize, thresholds: &DelaySelectionThresholds) -> Self {
        debug_assert!(thresholds.initial <= thresholds.converged);
        Self {
            histogram: vec![0; num_lags],
            history: vec![None; LAG_HISTORY_SIZE],
            history_index: 0,
            thresholds: thresholds.clone(),
            significant_candidate_found: false,
        }
    }

    /// Clears the histogram. A hard reset also forgets that a delay has
    /// converged, so the next reports are coarse again.
    pub(crate) fn reset(&mut self, hard_reset: bool) {
        self.histogram.fill(0);
        self.history.fill(None);
        self.history_index = 0;
        if hard_reset {
            self.significant_candidate_found = false;
        }
    }

    /// Adds the lag of the current block and returns the aggregated lag once
    /// it has been selected often enough.
    pub(crate) fn aggregate(&mut self, lag: Option<usize>) -> Option<(usize, DelayEstimateQuality)> {
        let lag = lag?;
        debug_assert!(lag < self.histogram.len());

        if let Some(old) = self.history[self.history_index] {
            self.histogram[old] -= 1;
        }
        self.history[self.history_index] = Some(lag);
        self.histogram[lag] += 1;
        self.history_index = (self.history_index + 1) % self.history.len();

        // Ties go to the larger lag.
        let (candidate, &hits) = self
            .histogram
            .iter()
            .enumerate()
            .max_by_key(|(_, hits)| **hits)?;

        self.significant_candidate_found |= hits > self.thresholds.converged;
        if hits > self.thresholds.converged
            || (hits > self.thresholds.initial && !self.significant_candidate_found)
        {
            let quality = if self.significant_candidate_found {
                DelayEstimateQuality::Refined
            } else {
                DelayEstimateQuality::Coarse
            };
            return Some((candidate, quality));
        }
        None
    }
}
