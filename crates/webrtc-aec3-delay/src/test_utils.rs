//! Deterministic signal generation shared by the unit tests.

use crate::common::BLOCK_SIZE;
use crate::config::RenderDelayConfig;
use crate::render_downsampler::RenderDownsampler;

/// Musl LCG; only the upper bits are used for samples.
pub(crate) struct TestRandom {
    state: u32,
}

impl TestRandom {
    pub(crate) fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        self.state
    }

    /// Uniform in `[-amplitude, amplitude)`.
    pub(crate) fn next_f32(&mut self, amplitude: f32) -> f32 {
        let unit = (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32;
        amplitude * (2.0 * unit - 1.0)
    }
}

/// White-noise render signal with a capture signal that echoes it after a
/// configurable delay.
pub(crate) struct EchoScenario {
    rng: TestRandom,
    render_amplitude: f32,
    capture_noise_amplitude: f32,
    render_history: Vec<f32>,
    pub(crate) render: RenderDownsampler,
}

impl EchoScenario {
    pub(crate) fn new(config: &RenderDelayConfig, seed: u32) -> Self {
        Self {
            rng: TestRandom::new(seed),
            render_amplitude: 10000.0,
            capture_noise_amplitude: 0.0,
            render_history: Vec::new(),
            render: RenderDownsampler::new(config),
        }
    }

    pub(crate) fn silent(config: &RenderDelayConfig) -> Self {
        let mut scenario = Self::new(config, 1);
        scenario.render_amplitude = 0.0;
        scenario
    }

    pub(crate) fn with_capture_noise(mut self, amplitude: f32) -> Self {
        self.capture_noise_amplitude = amplitude;
        self
    }

    /// Produces the next render block, inserts it into the render history and
    /// returns the capture block echoing the render signal `delay_samples`
    /// native samples later.
    pub(crate) fn next_capture(&mut self, delay_samples: usize) -> [f32; BLOCK_SIZE] {
        let mut render_block = [0.0f32; BLOCK_SIZE];
        for x in render_block.iter_mut() {
            *x = self.rng.next_f32(self.render_amplitude);
        }
        self.render.insert(&render_block);

        let start = self.render_history.len();
        self.render_history.extend_from_slice(&render_block);

        let mut capture = [0.0f32; BLOCK_SIZE];
        for (k, y) in capture.iter_mut().enumerate() {
            let n = start + k;
            let echo = if n >= delay_samples {
                self.render_history[n - delay_samples]
            } else {
                0.0
            };
            *y = echo + self.rng.next_f32(self.capture_noise_amplitude);
        }
        capture
    }
}
