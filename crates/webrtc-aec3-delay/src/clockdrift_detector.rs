//! Clock drift detection from the evolution of the estimated delay.
//!
//! A render/capture sample-rate mismatch makes the echo path delay creep in
//! one direction, one small step at a time. Jitter between neighbouring lags
//! reverses direction and large jumps are real delay changes; neither counts
//! as drift.

use crate::config::Clockdrift;

/// Level of detected clock drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockdriftLevel {
    None,
    Probable,
    Verified,
}

#[derive(Debug)]
pub(crate) struct ClockdriftDetector {
    config: Clockdrift,
    last_delay: Option<i32>,
    /// Sign of the current run of small steps, 0 when there is none.
    drift_direction: i32,
    drift_steps: usize,
    stability_counter: usize,
    level: ClockdriftLevel,
}

impl ClockdriftDetector {
    pub(crate) fn new(config: &Clockdrift) -> Self {
        Self {
            config: config.clone(),
            last_delay: None,
            drift_direction: 0,
            drift_steps: 0,
            stability_counter: 0,
            level: ClockdriftLevel::None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.last_delay = None;
        self.drift_direction = 0;
        self.drift_steps = 0;
        self.stability_counter = 0;
        self.level = ClockdriftLevel::None;
    }

    /// Updates the detector with a delay estimate in decimated samples.
    ///
    /// Only steps that extend the current drift run count as activity; an
    /// unchanged delay, jitter between neighbouring lags and jumps all count
    /// towards clearing the drift level.
    pub(crate) fn update(&mut self, delay_estimate: i32) {
        let Some(last_delay) = self.last_delay.replace(delay_estimate) else {
            return;
        };

        let step = delay_estimate - last_delay;
        let mut extends_run = false;
        if step != 0 && step.unsigned_abs() as usize <= self.config.max_drift_step {
            if step.signum() == self.drift_direction {
                self.drift_steps += 1;
                extends_run = true;
            } else {
                self.drift_direction = step.signum();
                self.drift_steps = 1;
            }

            if self.drift_steps >= self.config.verified_steps {
                self.level = ClockdriftLevel::Verified;
            } else if self.drift_steps >= self.config.probable_steps
                && self.level == ClockdriftLevel::None
            {
                self.level = ClockdriftLevel::Probable;
            }
        } else if step != 0 {
            self.drift_direction = 0;
            self.drift_steps = 0;
        }

        if extends_run {
            self.stability_counter = 0;
            return;
        }
        self.stability_counter += 1;
        if self.stability_counter > self.config.stable_blocks_to_clear {
            self.level = ClockdriftLevel::None;
            self.drift_direction = 0;
            self.drift_steps = 0;
            self.stability_counter = 0;
        }
    }

    pub(crate) fn clockdrift_level(&self) -> ClockdriftLevel {
        self.level
    }
}
