//! Render delay controller, which aligns render and capture signals.
//!
//! The controller turns the raw estimates of the echo path delay estimator
//! into a stable delay in native blocks. Deviations of up to
//! `hysteresis_limit_blocks` reaffirm the current delay, and a larger
//! deviation is only accepted after it has persisted for
//! `delay_change_persistence_blocks` consecutive estimates.

use crate::clockdrift_detector::{ClockdriftDetector, ClockdriftLevel};
use crate::common::BLOCK_SIZE_LOG2;
use crate::config::RenderDelayConfig;
use crate::delay_estimate::{DelayChange, DelayEstimate, DelayEstimateQuality};
use crate::downsampled_render_buffer::DownsampledRenderBuffer;
use crate::echo_path_delay_estimator::EchoPathDelayEstimator;
use crate::render_delay_controller_metrics::RenderDelayControllerMetrics;

/// Interface of a render delay controller, as used by the echo path aligner.
pub trait RenderDelayController {
    /// Resets the delay controller. Per-call state is always cleared. If
    /// `reset_delay_statistics` is true the accepted delay and the clockdrift
    /// history are cleared as well, so the next estimate is reported as newly
    /// detected.
    fn reset(&mut self, reset_delay_statistics: bool);

    /// Records that a render block was inserted into the render history.
    fn log_render_call(&mut self);

    /// Aligns the render buffer content with the capture signal and returns
    /// the delay in native blocks, if one is available.
    ///
    /// `capture` must hold exactly [`BLOCK_SIZE`](crate::BLOCK_SIZE) samples.
    fn get_delay(
        &mut self,
        render_buffer: &DownsampledRenderBuffer,
        render_delay_buffer_delay: usize,
        capture: &[f32],
    ) -> Option<DelayEstimate>;

    /// Returns true if clock drift has been detected.
    fn has_clockdrift(&self) -> bool;
}

/// A deviation from the accepted delay that has not persisted long enough to
/// be accepted.
#[derive(Debug, Clone, Copy)]
struct PendingDelayChange {
    delay_blocks: usize,
    count: usize,
}

/// Render delay controller backed by the correlation based echo path delay
/// estimator.
#[derive(Debug)]
pub struct DefaultRenderDelayController {
    hysteresis_limit_blocks: usize,
    delay_change_persistence_blocks: usize,
    log_warning_on_delay_changes: bool,
    delay_estimator: EchoPathDelayEstimator,
    clockdrift_detector: ClockdriftDetector,
    metrics: RenderDelayControllerMetrics,
    /// Accepted delay, in blocks.
    delay: Option<DelayEstimate>,
    pending_change: Option<PendingDelayChange>,
    render_call_logged: bool,
    capture_call_seen: bool,
}

impl DefaultRenderDelayController {
    /// Creates a controller. Out-of-range parameters are clamped.
    pub fn new(config: &RenderDelayConfig) -> Self {
        let mut config = config.clone();
        if !config.validate() {
            tracing::warn!(?config, "render delay config adjusted to valid ranges");
        }

        Self {
            hysteresis_limit_blocks: config.delay.hysteresis_limit_blocks,
            delay_change_persistence_blocks: config.delay.delay_change_persistence_blocks,
            log_warning_on_delay_changes: config.delay.log_warning_on_delay_changes,
            delay_estimator: EchoPathDelayEstimator::new(&config),
            clockdrift_detector: ClockdriftDetector::new(&config.clockdrift),
            metrics: RenderDelayControllerMetrics::new(),
            delay: None,
            pending_change: None,
            render_call_logged: false,
            capture_call_seen: false,
        }
    }

    /// Level of clock drift seen in the refined delay estimates.
    pub fn clockdrift_level(&self) -> ClockdriftLevel {
        self.clockdrift_detector.clockdrift_level()
    }

    fn update_clockdrift(&mut self, delay_estimate: i32) {
        let previous = self.clockdrift_detector.clockdrift_level();
        self.clockdrift_detector.update(delay_estimate);
        let level = self.clockdrift_detector.clockdrift_level();
        if level != previous {
            tracing::debug!(?previous, ?level, delay_estimate, "clockdrift level changed");
        }
    }

    /// Applies the hysteresis and persistence policy to a raw estimate.
    fn stabilize(&mut self, raw: DelayEstimate) -> DelayEstimate {
        let new_delay_blocks = raw.delay >> BLOCK_SIZE_LOG2;

        let Some(current) = self.delay else {
            return self.accept(raw, new_delay_blocks);
        };

        if new_delay_blocks.abs_diff(current.delay) <= self.hysteresis_limit_blocks {
            self.pending_change = None;
            return DelayEstimate {
                quality: raw.quality,
                confidence: raw.confidence,
                change: DelayChange::Reaffirmed,
                blocks_since_last_change: current.blocks_since_last_change + 1,
                blocks_since_last_update: 0,
                ..current
            };
        }

        let count = match self.pending_change {
            Some(pending) if pending.delay_blocks == new_delay_blocks => pending.count + 1,
            _ => 1,
        };
        if count >= self.delay_change_persistence_blocks {
            return self.accept(raw, new_delay_blocks);
        }
        self.pending_change = Some(PendingDelayChange {
            delay_blocks: new_delay_blocks,
            count,
        });

        DelayEstimate {
            change: DelayChange::Reaffirmed,
            blocks_since_last_change: current.blocks_since_last_change + 1,
            blocks_since_last_update: current.blocks_since_last_update + 1,
            ..current
        }
    }

    fn accept(&mut self, raw: DelayEstimate, delay_blocks: usize) -> DelayEstimate {
        let previous_delay_blocks = self.delay.map(|d| d.delay);
        if self.log_warning_on_delay_changes {
            tracing::warn!(
                previous = ?previous_delay_blocks,
                delay_blocks,
                confidence = raw.confidence,
                "render delay changed"
            );
        } else {
            tracing::debug!(
                previous = ?previous_delay_blocks,
                delay_blocks,
                confidence = raw.confidence,
                "render delay changed"
            );
        }
        self.pending_change = None;
        DelayEstimate {
            delay: delay_blocks,
            change: DelayChange::NewlyDetected,
            blocks_since_last_change: 0,
            blocks_since_last_update: 0,
            ..raw
        }
    }
}

impl RenderDelayController for DefaultRenderDelayController {
    fn reset(&mut self, reset_delay_statistics: bool) {
        self.render_call_logged = false;
        self.capture_call_seen = false;
        self.pending_change = None;
        self.delay_estimator.reset(reset_delay_statistics);
        if reset_delay_statistics {
            self.delay = None;
            self.clockdrift_detector.reset();
        }
    }

    fn log_render_call(&mut self) {
        self.render_call_logged = true;
    }

    fn get_delay(
        &mut self,
        render_buffer: &DownsampledRenderBuffer,
        render_delay_buffer_delay: usize,
        capture: &[f32],
    ) -> Option<DelayEstimate> {
        let starved = self.capture_call_seen && !self.render_call_logged;
        self.capture_call_seen = true;
        self.render_call_logged = false;
        if starved {
            tracing::debug!("no render call since the previous capture call; skipping estimation");
            self.metrics
                .update(None, self.clockdrift_detector.clockdrift_level());
            return None;
        }

        let estimate = match self
            .delay_estimator
            .estimate_delay(render_buffer, render_delay_buffer_delay, capture)
        {
            Some(raw) => {
                // Drift is tracked on the correlation lag, without the render
                // buffer offset.
                if raw.quality == DelayEstimateQuality::Refined
                    && let Some(lag) = self.delay_estimator.aggregated_lag()
                {
                    self.update_clockdrift(lag as i32);
                }
                let estimate = self.stabilize(raw);
                self.delay = Some(estimate);
                Some(estimate)
            }
            None => {
                if let Some(delay) = &mut self.delay {
                    delay.blocks_since_last_change += 1;
                    delay.blocks_since_last_update += 1;
                }
                None
            }
        };

        self.metrics.update(
            estimate.map(|e| e.delay),
            self.clockdrift_detector.clockdrift_level(),
        );
        estimate
    }

    fn has_clockdrift(&self) -> bool {
        self.clockdrift_detector.clockdrift_level() != ClockdriftLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::BLOCK_SIZE;
    use crate::test_utils::EchoScenario;

    fn config() -> RenderDelayConfig {
        let mut config = RenderDelayConfig::default();
        config.delay.max_delay_blocks = 16;
        config
    }

    /// Renders and captures one block, returning the controller output.
    fn process(
        controller: &mut DefaultRenderDelayController,
        scenario: &mut EchoScenario,
        delay_samples: usize,
    ) -> Option<DelayEstimate> {
        let capture = scenario.next_capture(delay_samples);
        controller.log_render_call();
        controller.get_delay(scenario.render.downsampled_render_buffer(), 0, &capture)
    }

    fn process_blocks(
        controller: &mut DefaultRenderDelayController,
        scenario: &mut EchoScenario,
        delay_samples: usize,
        num_blocks: usize,
    ) -> Option<DelayEstimate> {
        let mut estimate = None;
        for _ in 0..num_blocks {
            estimate = process(controller, scenario, delay_samples);
        }
        estimate
    }

    #[test]
    fn no_render_signal() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::silent(&config);
        for _ in 0..1000 {
            assert_eq!(process(&mut controller, &mut scenario, 0), None);
        }
        assert!(!controller.has_clockdrift());
    }

    #[test]
    fn alignment() {
        let config = config();
        for delay_samples in [0, 64, 152, 300, 500, 1000] {
            let mut controller = DefaultRenderDelayController::new(&config);
            let mut scenario = EchoScenario::new(&config, 17).with_capture_noise(200.0);
            let estimate =
                process_blocks(&mut controller, &mut scenario, delay_samples, 300).expect("delay");
            assert_eq!(estimate.delay, delay_samples / BLOCK_SIZE, "delay_samples={delay_samples}");
            assert_eq!(estimate.quality, DelayEstimateQuality::Refined);
        }
    }

    #[test]
    fn stable_delay_is_reaffirmed() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 5).with_capture_noise(300.0);
        let first = process_blocks(&mut controller, &mut scenario, 320, 100).expect("delay");
        for _ in 0..500 {
            let estimate = process(&mut controller, &mut scenario, 320).expect("delay");
            assert_eq!(estimate.delay, first.delay);
            assert_eq!(estimate.change, DelayChange::Reaffirmed);
            assert_eq!(estimate.blocks_since_last_update, 0);
        }
    }

    #[test]
    fn small_deviation_is_reaffirmed_and_large_one_persists() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 11);
        let estimate = process_blocks(&mut controller, &mut scenario, 256, 300).expect("delay");
        assert_eq!(estimate.delay, 4);

        // One block later stays within the hysteresis limit.
        let estimate = process_blocks(&mut controller, &mut scenario, 320, 400).expect("delay");
        assert_eq!(estimate.delay, 4);
        assert_eq!(estimate.change, DelayChange::Reaffirmed);

        // Six blocks later is accepted once it has persisted.
        let mut changes = Vec::new();
        for _ in 0..400 {
            if let Some(estimate) = process(&mut controller, &mut scenario, 640) {
                if estimate.is_newly_detected() {
                    changes.push(estimate.delay);
                }
            }
        }
        assert_eq!(changes, vec![10]);
    }

    #[test]
    fn render_starvation_suppresses_output() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 23);
        process_blocks(&mut controller, &mut scenario, 128, 200).expect("delay");

        // Capture without a preceding render call.
        let capture = scenario.next_capture(128);
        assert_eq!(
            controller.get_delay(scenario.render.downsampled_render_buffer(), 0, &capture),
            None
        );
        assert!(process(&mut controller, &mut scenario, 128).is_some());
    }

    #[test]
    fn reset_with_statistics_starts_fresh() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 31);
        process_blocks(&mut controller, &mut scenario, 512, 300).expect("delay");

        controller.reset(true);
        assert!(!controller.has_clockdrift());
        let estimate = (0..100)
            .find_map(|_| process(&mut controller, &mut scenario, 512))
            .expect("delay");
        assert_eq!(estimate.change, DelayChange::NewlyDetected);
        assert_eq!(estimate.quality, DelayEstimateQuality::Coarse);
        assert_eq!(estimate.delay, 8);
    }

    #[test]
    fn reset_without_statistics_keeps_delay() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 37);
        process_blocks(&mut controller, &mut scenario, 512, 300).expect("delay");

        // Without the reset this capture call would count as starved.
        let capture = scenario.next_capture(512);
        controller.reset(false);
        let estimate = controller
            .get_delay(scenario.render.downsampled_render_buffer(), 0, &capture)
            .expect("delay");
        assert_eq!(estimate.change, DelayChange::Reaffirmed);
        assert_eq!(estimate.delay, 8);
        assert_eq!(estimate.quality, DelayEstimateQuality::Refined);
    }

    #[test]
    fn clockdrift_is_detected_and_clears() {
        let mut config = config();
        config.clockdrift.stable_blocks_to_clear = 500;
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 41).with_capture_noise(100.0);

        // The delay grows by one decimated sample every 100 blocks.
        for block in 0..1200 {
            let delay = 4 * (40 + (block / 100).min(12));
            process(&mut controller, &mut scenario, delay);
        }
        assert!(controller.has_clockdrift());

        process_blocks(&mut controller, &mut scenario, 4 * 52, 1500);
        assert!(!controller.has_clockdrift());
        assert_eq!(controller.clockdrift_level(), ClockdriftLevel::None);
    }

    #[test]
    fn reset_without_statistics_keeps_clockdrift() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 47).with_capture_noise(100.0);
        for block in 0..700 {
            let delay = 4 * (40 + block / 100);
            process(&mut controller, &mut scenario, delay);
        }
        assert!(controller.has_clockdrift());

        controller.reset(false);
        assert!(controller.has_clockdrift());
        process_blocks(&mut controller, &mut scenario, 4 * 47, 50);
        assert!(controller.has_clockdrift());

        controller.reset(true);
        assert!(!controller.has_clockdrift());
    }

    #[test]
    fn render_buffer_delay_steps_are_not_clockdrift() {
        let config = config();
        let mut controller = DefaultRenderDelayController::new(&config);
        let mut scenario = EchoScenario::new(&config, 53).with_capture_noise(100.0);
        for block in 0..700 {
            let capture = scenario.next_capture(160);
            controller.log_render_call();
            controller.get_delay(scenario.render.downsampled_render_buffer(), block / 100, &capture);
        }
        assert!(!controller.has_clockdrift());
    }

    #[test]
    fn invalid_config_is_clamped() {
        let config = config();
        let mut invalid = config.clone();
        invalid.delay.down_sampling_factor = 5;
        let mut controller = DefaultRenderDelayController::new(&invalid);
        let mut scenario = EchoScenario::new(&config, 43);
        let estimate = process_blocks(&mut controller, &mut scenario, 128, 200).expect("delay");
        assert_eq!(estimate.delay, 2);
    }
}
