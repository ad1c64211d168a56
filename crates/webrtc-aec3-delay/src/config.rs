//! Render delay estimation configuration.

/// Configuration for the render delay controller and its estimator.
///
/// The defaults are tuned for 16 kHz int16-scaled audio. Use
/// [`validate()`](Self::validate) to clamp all parameters to usable ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderDelayConfig {
    /// Correlation search, delay selection and hysteresis settings.
    pub delay: Delay,
    /// Clockdrift detection settings.
    pub clockdrift: Clockdrift,
}

impl RenderDelayConfig {
    /// Validates and clamps config parameters to reasonable ranges.
    /// Returns `true` if no changes were needed.
    pub fn validate(&mut self) -> bool {
        let mut ok = true;

        let delay = &mut self.delay;
        if delay.down_sampling_factor != 4 && delay.down_sampling_factor != 8 {
            delay.down_sampling_factor = 4;
            ok = false;
        }
        ok &= limit_usize(&mut delay.max_delay_blocks, 1, 1000);
        ok &= limit_f32(&mut delay.correlation_smoothing, 0.0, 0.999);
        ok &= limit_f32(&mut delay.detection_threshold, 0.0, 1.0);
        ok &= limit_f32(&mut delay.excitation_limit, 0.0, 32768.0);
        ok &= limit_usize(&mut delay.delay_selection_thresholds.initial, 1, 250);
        ok &= limit_usize(&mut delay.delay_selection_thresholds.converged, 1, 250);
        if delay.delay_selection_thresholds.initial > delay.delay_selection_thresholds.converged {
            delay.delay_selection_thresholds.initial = delay.delay_selection_thresholds.converged;
            ok = false;
        }
        ok &= limit_usize(&mut delay.hysteresis_limit_blocks, 0, 5000);
        ok &= limit_usize(&mut delay.delay_change_persistence_blocks, 1, 5000);

        let clockdrift = &mut self.clockdrift;
        ok &= limit_usize(&mut clockdrift.probable_steps, 1, 100);
        ok &= limit_usize(&mut clockdrift.verified_steps, 1, 100);
        if clockdrift.probable_steps > clockdrift.verified_steps {
            clockdrift.probable_steps = clockdrift.verified_steps;
            ok = false;
        }
        ok &= limit_usize(&mut clockdrift.max_drift_step, 1, 100);
        ok &= floor_limit_usize(&mut clockdrift.stable_blocks_to_clear, 1);

        ok
    }
}

fn limit_f32(value: &mut f32, min: f32, max: f32) -> bool {
    let clamped = value.clamp(min, max);
    let clamped = if clamped.is_finite() { clamped } else { min };
    let unchanged = *value == clamped;
    *value = clamped;
    unchanged
}

fn limit_usize(value: &mut usize, min: usize, max: usize) -> bool {
    let clamped = (*value).clamp(min, max);
    let unchanged = *value == clamped;
    *value = clamped;
    unchanged
}

fn floor_limit_usize(value: &mut usize, min: usize) -> bool {
    if *value < min {
        *value = min;
        false
    } else {
        true
    }
}

/// Number of histogram hits the lag aggregator requires before it reports a
/// delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelaySelectionThresholds {
    /// Hits needed for a coarse estimate before any delay has converged.
    pub initial: usize,
    /// Hits needed for a refined estimate.
    pub converged: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    /// Decimation applied to both signals before correlation (4 or 8).
    pub down_sampling_factor: usize,
    /// Largest delay searched, in native blocks.
    pub max_delay_blocks: usize,
    /// Leak factor of the running correlation sums.
    pub correlation_smoothing: f32,
    /// Minimum normalized correlation for a lag to become a candidate.
    pub detection_threshold: f32,
    /// Minimum RMS of the decimated render and capture signals.
    pub excitation_limit: f32,
    pub delay_selection_thresholds: DelaySelectionThresholds,
    /// Deviations up to this many blocks reaffirm the current delay.
    pub hysteresis_limit_blocks: usize,
    /// Consecutive calls a larger deviation must persist to be accepted.
    pub delay_change_persistence_blocks: usize,
    pub log_warning_on_delay_changes: bool,
}

impl Default for Delay {
    fn default() -> Self {
        Self {
            down_sampling_factor: 4,
            max_delay_blocks: 128,
            correlation_smoothing: 0.9,
            detection_threshold: 0.5,
            excitation_limit: 150.0,
            delay_selection_thresholds: DelaySelectionThresholds {
                initial: 5,
                converged: 20,
            },
            hysteresis_limit_blocks: 1,
            delay_change_persistence_blocks: 10,
            log_warning_on_delay_changes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clockdrift {
    /// Same-direction delay steps before drift is considered probable.
    pub probable_steps: usize,
    /// Same-direction delay steps before drift is considered verified.
    pub verified_steps: usize,
    /// Largest single step, in decimated samples, still attributed to drift.
    pub max_drift_step: usize,
    /// Updates with an unchanged delay after which the drift flag clears.
    pub stable_blocks_to_clear: usize,
}

impl Default for Clockdrift {
    fn default() -> Self {
        Self {
            probable_steps: 2,
            verified_steps: 3,
            max_drift_step: 2,
            // 30 seconds.
            stable_blocks_to_clear: 7500,
        }
    }
}
