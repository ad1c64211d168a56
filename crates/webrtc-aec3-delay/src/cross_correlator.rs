//! Leaky normalized cross-correlation between decimated capture and render.
//!
//! For every lag in the search range the correlator keeps running sums of
//! `x·y` and `x·x`, plus one running sum of `y·y`, all decaying by the same
//! smoothing factor. The normalized correlation of a lag is
//! `|Σxy| / sqrt(Σxx · Σyy)`, which is 1 for a render window identical (up to
//! gain) to the capture signal.

use crate::downsampled_render_buffer::DownsampledRenderBuffer;

/// Strongest lag found for one capture sub-block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CorrelationPeak {
    /// Lag in decimated samples, relative to the newest render sample.
    pub lag: usize,
    /// Normalized correlation at `lag`, in `0.0..=1.0`.
    pub strength: f32,
}

#[derive(derive_more::Debug)]
pub(crate) struct CrossCorrelator {
    sub_block_size: usize,
    smoothing: f32,
    /// Minimum sub-block energy for either signal to update the sums.
    excitation_energy: f32,
    detection_threshold: f32,
    #[debug(skip)]
    rxy: Vec<f32>,
    #[debug(skip)]
    rxx: Vec<f32>,
    ryy: f32,
}

impl CrossCorrelator {
    pub(crate) fn new(
        sub_block_size: usize,
        num_lags: usize,
        smoothing: f32,
        excitation_limit: f32,
        detection_threshold: f32,
    ) -> Self {
        debug_assert!(sub_block_size > 0);
        debug_assert!(num_lags > 0);
        Self {
            sub_block_size,
            smoothing,
            excitation_energy: sub_block_size as f32 * excitation_limit * excitation_limit,
            detection_threshold,
            rxy: vec![0.0; num_lags],
            rxx: vec![0.0; num_lags],
            ryy: 0.0,
        }
    }

    pub(crate) fn num_lags(&self) -> usize {
        self.rxy.len()
    }

    /// Number of render samples needed to correlate every lag.
    pub(crate) fn required_history(&self) -> usize {
        self.num_lags() - 1 + self.sub_block_size
    }

    pub(crate) fn reset(&mut self) {
        self.rxy.fill(0.0);
        self.rxx.fill(0.0);
        self.ryy = 0.0;
    }

    /// Correlates the capture sub-block against all lags of the render
    /// history and returns the strongest lag if it is strong enough.
    ///
    /// The sums are left untouched when the history does not cover the
    /// search range yet, or when either signal is too weak.
    pub(crate) fn update(
        &mut self,
        render_buffer: &DownsampledRenderBuffer,
        capture: &[f32],
    ) -> Option<CorrelationPeak> {
        debug_assert_eq!(self.sub_block_size, capture.len());

        let window = render_buffer.read(0, self.required_history());
        if window.is_empty() {
            return None;
        }

        let capture_energy: f32 = capture.iter().map(|y| y * y).sum();
        if capture_energy < self.excitation_energy {
            return None;
        }
        let render_energy = window.iter().map(|x| x * x).sum::<f32>() * self.sub_block_size as f32
            / window.len() as f32;
        if render_energy < self.excitation_energy {
            return None;
        }

        self.ryy = self.smoothing * self.ryy + capture_energy;

        // Lag 0 aligns the newest capture sample with the newest render
        // sample, which sits at the end of `window`.
        let last_start = self.num_lags() - 1;
        for (lag, (rxy, rxx)) in self.rxy.iter_mut().zip(self.rxx.iter_mut()).enumerate() {
            let start = last_start - lag;
            let x = &window[start..start + self.sub_block_size];
            let (xy, xx) = x
                .iter()
                .zip(capture)
                .fold((0.0f32, 0.0f32), |(xy, xx), (&x, &y)| (xy + x * y, xx + x * x));
            *rxy = self.smoothing * *rxy + xy;
            *rxx = self.smoothing * *rxx + xx;
        }

        let mut peak = CorrelationPeak {
            lag: 0,
            strength: 0.0,
        };
        for lag in 0..self.num_lags() {
            let strength = self.strength(lag);
            if strength > peak.strength {
                peak = CorrelationPeak { lag, strength };
            }
        }

        (peak.strength >= self.detection_threshold && peak.strength > 0.0).then_some(peak)
    }

    /// Normalized correlation currently held for `lag`.
    pub(crate) fn strength(&self, lag: usize) -> f32 {
        let denominator = self.rxx[lag] * self.ryy;
        if denominator <= 0.0 {
            return 0.0;
        }
        (self.rxy[lag].abs() / denominator.sqrt()).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestRandom;

    const SUB_BLOCK_SIZE: usize = 16;
    const NUM_LAGS: usize = 64;

    fn correlator() -> CrossCorrelator {
        CrossCorrelator::new(SUB_BLOCK_SIZE, NUM_LAGS, 0.9, 150.0, 0.5)
    }

    /// Feeds white noise directly in the decimated domain, with the capture
    /// signal trailing the render signal by `delay` samples and scaled by
    /// `gain`.
    fn run(correlator: &mut CrossCorrelator, delay: usize, gain: f32) -> Option<CorrelationPeak> {
        let mut rng = TestRandom::new(7);
        let mut render = DownsampledRenderBuffer::new(NUM_LAGS + SUB_BLOCK_SIZE);
        let mut history = Vec::new();
        let mut peak = None;
        for _ in 0..40 {
            let block: Vec<f32> = (0..SUB_BLOCK_SIZE).map(|_| rng.next_f32(5000.0)).collect();
            render.insert(&block);
            let start = history.len();
            history.extend_from_slice(&block);
            let capture: Vec<f32> = (start..history.len())
                .map(|n| if n >= delay { gain * history[n - delay] } else { 0.0 })
                .collect();
            peak = correlator.update(&render, &capture);
        }
        peak
    }

    #[test]
    fn finds_the_delayed_lag() {
        for delay in [0, 1, 17, 40, NUM_LAGS - 1] {
            let mut correlator = correlator();
            let peak = run(&mut correlator, delay, 1.0).expect("peak");
            assert_eq!(peak.lag, delay);
            assert!(peak.strength > 0.99, "strength={}", peak.strength);
        }
    }

    #[test]
    fn inverted_echo_is_found() {
        let mut correlator = correlator();
        let peak = run(&mut correlator, 12, -0.3).expect("peak");
        assert_eq!(peak.lag, 12);
    }

    #[test]
    fn weak_capture_is_ignored() {
        let mut correlator = correlator();
        assert_eq!(run(&mut correlator, 12, 0.001), None);
        assert_eq!(correlator.strength(12), 0.0);
    }

    #[test]
    fn insufficient_history_yields_nothing() {
        let mut correlator = correlator();
        let mut render = DownsampledRenderBuffer::new(NUM_LAGS + SUB_BLOCK_SIZE);
        render.insert(&[1000.0; SUB_BLOCK_SIZE]);
        assert_eq!(correlator.update(&render, &[1000.0; SUB_BLOCK_SIZE]), None);
    }

    #[test]
    fn reset_clears_the_sums() {
        let mut correlator = correlator();
        run(&mut correlator, 3, 1.0).expect("peak");
        correlator.reset();
        for lag in 0..NUM_LAGS {
            assert_eq!(correlator.strength(lag), 0.0);
        }
    }
}
