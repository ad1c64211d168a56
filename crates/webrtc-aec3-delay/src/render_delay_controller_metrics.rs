//! Periodic summary of the render delay controller's behavior.

use crate::clockdrift_detector::ClockdriftLevel;
use crate::common::{METRICS_REPORTING_INTERVAL_BLOCKS, NUM_BLOCKS_PER_SECOND};

/// Calls ignored after construction, while the estimate is still settling.
const NUM_INITIAL_CALLS: usize = 5 * NUM_BLOCKS_PER_SECOND;

/// Counts reliable estimates and delay changes, and logs a summary once per
/// reporting interval.
#[derive(Debug)]
pub(crate) struct RenderDelayControllerMetrics {
    delay_blocks: Option<usize>,
    reliable_delay_estimate_counter: usize,
    delay_change_counter: usize,
    call_counter: usize,
    initial_call_counter: usize,
    initial_update: bool,
}

impl RenderDelayControllerMetrics {
    pub(crate) fn new() -> Self {
        Self {
            delay_blocks: None,
            reliable_delay_estimate_counter: 0,
            delay_change_counter: 0,
            call_counter: 0,
            initial_call_counter: 0,
            initial_update: true,
        }
    }

    /// Updates the metrics with the outcome of one capture call.
    pub(crate) fn update(&mut self, delay_blocks: Option<usize>, clockdrift: ClockdriftLevel) {
        self.call_counter += 1;

        if !self.initial_update {
            if delay_blocks.is_some() {
                self.reliable_delay_estimate_counter += 1;
            }
            if delay_blocks != self.delay_blocks {
                self.delay_change_counter += 1;
                self.delay_blocks = delay_blocks;
            }
        } else {
            self.initial_call_counter += 1;
            if self.initial_call_counter == NUM_INITIAL_CALLS {
                self.initial_update = false;
            }
        }

        if self.call_counter == METRICS_REPORTING_INTERVAL_BLOCKS {
            tracing::debug!(
                reliable_delay_estimates = self.reliable_delay_estimate_counter,
                delay_changes = self.delay_change_counter,
                delay_blocks = ?self.delay_blocks,
                ?clockdrift,
                "render delay controller metrics"
            );
            self.call_counter = 0;
            self.reset_metrics();
        }
    }

    fn reset_metrics(&mut self) {
        self.delay_change_counter = 0;
        self.reliable_delay_estimate_counter = 0;
    }
}
