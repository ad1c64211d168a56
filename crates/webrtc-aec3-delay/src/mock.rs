//! Scripted render delay controller for testing code that owns a controller.

use std::collections::VecDeque;

use crate::delay_estimate::DelayEstimate;
use crate::downsampled_render_buffer::DownsampledRenderBuffer;
use crate::render_delay_controller::RenderDelayController;

/// A [`RenderDelayController`] that replays scripted estimates and records
/// how it was driven.
#[derive(Debug, Default)]
pub struct MockRenderDelayController {
    estimates: VecDeque<Option<DelayEstimate>>,
    clockdrift: bool,
    /// Arguments of every `reset` call, in order.
    pub reset_calls: Vec<bool>,
    pub render_calls: usize,
    pub get_delay_calls: usize,
}

impl MockRenderDelayController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of a future `get_delay` call. Calls beyond the
    /// scripted ones return `None`.
    pub fn push_estimate(&mut self, estimate: Option<DelayEstimate>) {
        self.estimates.push_back(estimate);
    }

    pub fn set_clockdrift(&mut self, clockdrift: bool) {
        self.clockdrift = clockdrift;
    }
}

impl RenderDelayController for MockRenderDelayController {
    fn reset(&mut self, reset_delay_statistics: bool) {
        self.reset_calls.push(reset_delay_statistics);
    }

    fn log_render_call(&mut self) {
        self.render_calls += 1;
    }

    fn get_delay(
        &mut self,
        _render_buffer: &DownsampledRenderBuffer,
        _render_delay_buffer_delay: usize,
        _capture: &[f32],
    ) -> Option<DelayEstimate> {
        self.get_delay_calls += 1;
        self.estimates.pop_front().flatten()
    }

    fn has_clockdrift(&self) -> bool {
        self.clockdrift
    }
}
