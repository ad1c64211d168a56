//! Block decimation with anti-aliasing for the correlation domain.

use crate::cascaded_biquad_filter::{BiQuadCoefficients, CascadedBiQuadFilter};
use crate::common::{BLOCK_SIZE, sub_block_size};

// signal.ellip(6, 1, 40, 1800/8000, 'lowpass', output='sos')
const LOW_PASS_FILTER_DS4: [BiQuadCoefficients; 3] = [
    BiQuadCoefficients {
        b: [0.018_091_987_7, 0.003_209_613_63, 0.018_091_987_7],
        a: [-1.518_319_5, 0.633_165_865],
    },
    BiQuadCoefficients {
        b: [1.0, -1.245_504_59, 1.0],
        a: [-1.497_842_54, 0.853_586_692],
    },
    BiQuadCoefficients {
        b: [1.0, -1.422_168_1, 1.0],
        a: [-1.497_912_82, 0.969_572_384],
    },
];

// signal.cheby1(1, 6, [1000/8000, 2000/8000], 'bandpass', output='sos')
// repeated 5 times.
const BAND_PASS_FILTER_DS8: [BiQuadCoefficients; 5] = [BiQuadCoefficients {
    b: [0.103_304_783, 0.0, -0.103_304_783],
    a: [-1.520_363, 0.793_390_435],
}; 5];

// signal.butter(2, 1000/8000.0, 'highpass', output='sos')
const HIGH_PASS_FILTER: [BiQuadCoefficients; 1] = [BiQuadCoefficients {
    b: [0.757_076_375, -1.514_152_75, 0.757_076_375],
    a: [-1.454_243_59, 0.574_061_915],
}];

/// Downsamples native blocks by a factor of 4 or 8.
///
/// Render and capture must be decimated by decimators with identical
/// configuration for their correlation to be meaningful; a delay that is a
/// multiple of the factor is then preserved exactly in the decimated domain.
#[derive(Debug, Clone)]
pub struct Decimator {
    down_sampling_factor: usize,
    anti_aliasing_filter: CascadedBiQuadFilter,
    noise_reduction_filter: CascadedBiQuadFilter,
}

impl Decimator {
    pub fn new(down_sampling_factor: usize) -> Self {
        debug_assert!(down_sampling_factor == 4 || down_sampling_factor == 8);
        let (anti_aliasing, noise_reduction): (&[BiQuadCoefficients], &[BiQuadCoefficients]) =
            if down_sampling_factor == 8 {
                (&BAND_PASS_FILTER_DS8, &[])
            } else {
                (&LOW_PASS_FILTER_DS4, &HIGH_PASS_FILTER)
            };
        Self {
            down_sampling_factor,
            anti_aliasing_filter: CascadedBiQuadFilter::new(anti_aliasing),
            noise_reduction_filter: CascadedBiQuadFilter::new(noise_reduction),
        }
    }

    pub fn down_sampling_factor(&self) -> usize {
        self.down_sampling_factor
    }

    /// Decimates a `BLOCK_SIZE`-sample block into
    /// `BLOCK_SIZE / down_sampling_factor` samples.
    pub fn decimate(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(BLOCK_SIZE, input.len());
        debug_assert_eq!(sub_block_size(self.down_sampling_factor), output.len());

        let mut x = [0.0f32; BLOCK_SIZE];
        self.anti_aliasing_filter.process(input, &mut x);
        self.noise_reduction_filter.process_in_place(&mut x);

        for (out, &sample) in output
            .iter_mut()
            .zip(x.iter().step_by(self.down_sampling_factor))
        {
            *out = sample;
        }
    }

    /// Clears the filter states.
    pub fn reset(&mut self) {
        self.anti_aliasing_filter.reset();
        self.noise_reduction_filter.reset();
    }
}
