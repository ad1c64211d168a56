//! Render/capture alignment driven by a render delay controller.
//!
//! The aligner is the pipeline side of delay estimation: it owns the render
//! history, forwards render and capture blocks to the controller in the
//! expected order, and turns controller output into the alignment the echo
//! canceller acts on.

use crate::config::RenderDelayConfig;
use crate::delay_estimate::DelayEstimate;
use crate::render_delay_controller::{DefaultRenderDelayController, RenderDelayController};
use crate::render_downsampler::RenderDownsampler;

/// Type of delay adjustment reported for a capture block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DelayAdjustment {
    #[default]
    None,
    NewDetectedDelay,
}

/// Alignment of one capture block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentStatus {
    /// Delay to apply, in native blocks. Falls back to the last known delay
    /// when the controller produced no estimate for this block.
    pub delay_blocks: Option<usize>,
    pub delay_change: DelayAdjustment,
    pub clock_drift: bool,
    /// Controller output for this block.
    pub estimate: Option<DelayEstimate>,
}

impl AlignmentStatus {
    /// Returns whether the echo path delay changed with this block.
    pub fn audio_path_changed(&self) -> bool {
        self.delay_change != DelayAdjustment::None
    }
}

/// Aligns capture blocks with the render signal.
#[derive(Debug)]
pub struct EchoPathAligner<C = DefaultRenderDelayController> {
    render: RenderDownsampler,
    delay_controller: C,
    render_delay_buffer_delay: usize,
    render_properly_started: bool,
    capture_properly_started: bool,
    last_known_delay: Option<usize>,
}

impl EchoPathAligner {
    pub fn new(config: &RenderDelayConfig) -> Self {
        Self::with_controller(config, DefaultRenderDelayController::new(config))
    }
}

impl<C: RenderDelayController> EchoPathAligner<C> {
    /// Creates an aligner around an existing controller. `config` only sizes
    /// the render history and must match the controller's; it is clamped the
    /// same way.
    pub fn with_controller(config: &RenderDelayConfig, delay_controller: C) -> Self {
        Self {
            render: RenderDownsampler::new(config),
            delay_controller,
            render_delay_buffer_delay: 0,
            render_properly_started: false,
            capture_properly_started: false,
            last_known_delay: None,
        }
    }

    /// Sets the number of decimated samples the render history trails the
    /// render signal by, e.g. due to upstream buffering.
    pub fn set_render_delay_buffer_delay(&mut self, delay: usize) {
        self.render_delay_buffer_delay = delay;
    }

    /// Buffers a block of render data.
    pub fn buffer_render(&mut self, block: &[f32]) {
        self.render.insert(block);
        self.render_properly_started = true;
        self.delay_controller.log_render_call();
    }

    /// Estimates the alignment of a block of capture data.
    pub fn process_capture(&mut self, capture: &[f32]) -> AlignmentStatus {
        if self.render_properly_started {
            if !self.capture_properly_started {
                self.capture_properly_started = true;
                self.delay_controller.reset(true);
            }
        } else {
            // If no render data has yet arrived, do not process the capture signal.
            return AlignmentStatus::default();
        }

        let estimate = self.delay_controller.get_delay(
            self.render.downsampled_render_buffer(),
            self.render_delay_buffer_delay,
            capture,
        );

        let mut delay_change = DelayAdjustment::None;
        if let Some(estimate) = &estimate
            && self.last_known_delay != Some(estimate.delay)
        {
            self.last_known_delay = Some(estimate.delay);
            delay_change = DelayAdjustment::NewDetectedDelay;
        }

        AlignmentStatus {
            delay_blocks: self.last_known_delay,
            delay_change,
            clock_drift: self.delay_controller.has_clockdrift(),
            estimate,
        }
    }

    /// Starts over as after a device change: the render history is dropped
    /// and the controller is reset with statistics on the next capture block
    /// that follows render data.
    pub fn reset(&mut self) {
        self.render.reset();
        self.render_properly_started = false;
        self.capture_properly_started = false;
        self.last_known_delay = None;
    }

    pub fn delay_controller(&self) -> &C {
        &self.delay_controller
    }
}
