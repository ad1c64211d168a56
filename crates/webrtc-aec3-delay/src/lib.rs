//! Render delay estimation for the AEC3 echo canceller.
//!
//! Estimates how far the echo in the capture signal trails the render signal
//! sent to the loudspeaker, and detects clock drift between the two streams.
//!
//! The render side decimates each render block into a
//! [`DownsampledRenderBuffer`] (see [`RenderDownsampler`]) and calls
//! [`RenderDelayController::log_render_call`]. The capture side calls
//! [`RenderDelayController::get_delay`] once per capture block and receives a
//! stabilized [`DelayEstimate`] in native blocks. [`EchoPathAligner`] wires
//! both sides together.

#![deny(unsafe_code)]

pub(crate) mod cascaded_biquad_filter;
pub(crate) mod clockdrift_detector;
pub(crate) mod common;
pub(crate) mod config;
pub(crate) mod cross_correlator;
pub(crate) mod decimator;
pub(crate) mod delay_estimate;
pub(crate) mod downsampled_render_buffer;
pub(crate) mod echo_path_aligner;
pub(crate) mod echo_path_delay_estimator;
pub(crate) mod lag_aggregator;
#[cfg(any(test, feature = "mock"))]
pub(crate) mod mock;
pub(crate) mod render_delay_controller;
pub(crate) mod render_delay_controller_metrics;
pub(crate) mod render_downsampler;

#[cfg(test)]
mod test_utils;

pub use clockdrift_detector::ClockdriftLevel;
pub use common::{BLOCK_SIZE, NUM_BLOCKS_PER_SECOND, downsampled_buffer_size, sub_block_size};
pub use config::{Clockdrift, Delay, DelaySelectionThresholds, RenderDelayConfig};
pub use decimator::Decimator;
pub use delay_estimate::{DelayChange, DelayEstimate, DelayEstimateQuality};
pub use downsampled_render_buffer::DownsampledRenderBuffer;
pub use echo_path_aligner::{AlignmentStatus, DelayAdjustment, EchoPathAligner};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRenderDelayController;
pub use render_delay_controller::{DefaultRenderDelayController, RenderDelayController};
pub use render_downsampler::RenderDownsampler;
