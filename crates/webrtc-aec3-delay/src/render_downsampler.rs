//! Render-side writer of the downsampled render history.

use crate::common::{BLOCK_SIZE, downsampled_buffer_size, sub_block_size};
use crate::config::RenderDelayConfig;
use crate::decimator::Decimator;
use crate::downsampled_render_buffer::DownsampledRenderBuffer;

/// Decimates render blocks and appends them to the history read by the
/// delay estimator.
#[derive(Debug, Clone)]
pub struct RenderDownsampler {
    decimator: Decimator,
    low_rate: DownsampledRenderBuffer,
    render_ds: Vec<f32>,
}

impl RenderDownsampler {
    /// Creates a writer whose history covers the configured search range.
    /// Out-of-range parameters are clamped as by
    /// [`RenderDelayConfig::validate`].
    pub fn new(config: &RenderDelayConfig) -> Self {
        let mut config = config.clone();
        config.validate();
        let down_sampling_factor = config.delay.down_sampling_factor;
        Self {
            decimator: Decimator::new(down_sampling_factor),
            low_rate: DownsampledRenderBuffer::new(downsampled_buffer_size(
                down_sampling_factor,
                config.delay.max_delay_blocks,
            )),
            render_ds: vec![0.0; sub_block_size(down_sampling_factor)],
        }
    }

    /// Decimates one native render block into the history.
    pub fn insert(&mut self, block: &[f32]) {
        debug_assert_eq!(BLOCK_SIZE, block.len());
        self.decimator.decimate(block, &mut self.render_ds);
        self.low_rate.insert(&self.render_ds);
    }

    pub fn downsampled_render_buffer(&self) -> &DownsampledRenderBuffer {
        &self.low_rate
    }

    /// Drops the history and the decimator state, e.g. after a device change.
    pub fn reset(&mut self) {
        self.decimator.reset();
        self.low_rate.clear();
    }
}
