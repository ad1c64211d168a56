//! Echo path delay estimator.
//!
//! Decimates the capture block, correlates it against the render history and
//! aggregates the per-block lags into a delay estimate in native samples.

use crate::common::{BLOCK_SIZE, num_correlation_lags, sub_block_size};
use crate::config::RenderDelayConfig;
use crate::cross_correlator::CrossCorrelator;
use crate::decimator::Decimator;
use crate::delay_estimate::DelayEstimate;
use crate::downsampled_render_buffer::DownsampledRenderBuffer;
use crate::lag_aggregator::LagAggregator;

/// Estimates the delay of the echo path.
#[derive(Debug)]
pub(crate) struct EchoPathDelayEstimator {
    down_sampling_factor: usize,
    sub_block_size: usize,
    capture_decimator: Decimator,
    correlator: CrossCorrelator,
    lag_aggregator: LagAggregator,
    /// Aggregated lag behind the latest estimate, in decimated samples.
    aggregated_lag: Option<usize>,
}

impl EchoPathDelayEstimator {
    pub(crate) fn new(config: &RenderDelayConfig) -> Self {
        let down_sampling_factor = config.delay.down_sampling_factor;
        let sub_block_size = sub_block_size(down_sampling_factor);
        let num_lags = num_correlation_lags(down_sampling_factor, config.delay.max_delay_blocks);

        Self {
            down_sampling_factor,
            sub_block_size,
            capture_decimator: Decimator::new(down_sampling_factor),
            correlator: CrossCorrelator::new(
                sub_block_size,
                num_lags,
                config.delay.correlation_smoothing,
                config.delay.excitation_limit,
                config.delay.detection_threshold,
            ),
            lag_aggregator: LagAggregator::new(num_lags, &config.delay.delay_selection_thresholds),
            aggregated_lag: None,
        }
    }

    /// Resets the estimation. If `reset_delay_confidence` is true, the reset
    /// behavior is as if the call is restarted: the lag histogram forgets that
    /// a delay ever converged and the capture filters restart from silence.
    pub(crate) fn reset(&mut self, reset_delay_confidence: bool) {
        self.correlator.reset();
        self.aggregated_lag = None;
        if reset_delay_confidence {
            self.lag_aggregator.reset(true);
            self.capture_decimator.reset();
        }
    }

    /// Produces a delay estimate in native samples if one is available.
    ///
    /// `render_delay_buffer_delay` is the number of decimated samples by which
    /// the exposed render history trails the render signal.
    pub(crate) fn estimate_delay(
        &mut self,
        render_buffer: &DownsampledRenderBuffer,
        render_delay_buffer_delay: usize,
        capture: &[f32],
    ) -> Option<DelayEstimate> {
        debug_assert_eq!(BLOCK_SIZE, capture.len());

        let mut downsampled_capture_data = [0.0f32; BLOCK_SIZE];
        let downsampled_capture = &mut downsampled_capture_data[..self.sub_block_size];
        self.capture_decimator
            .decimate(capture, downsampled_capture);

        let peak = self.correlator.update(render_buffer, downsampled_capture);
        self.aggregated_lag = None;
        let (lag, quality) = self.lag_aggregator.aggregate(peak.map(|p| p.lag))?;
        self.aggregated_lag = Some(lag);
        let confidence = match peak {
            Some(peak) if peak.lag == lag => peak.strength,
            _ => self.correlator.strength(lag),
        };

        Some(DelayEstimate::new(
            quality,
            lag.saturating_add(render_delay_buffer_delay)
                .saturating_mul(self.down_sampling_factor),
            confidence,
        ))
    }

    /// Correlation lag of the latest estimate, without the render buffer
    /// delay. `None` when the latest call produced no estimate.
    pub(crate) fn aggregated_lag(&self) -> Option<usize> {
        self.aggregated_lag
    }
}
