//! Cascade of second-order IIR sections (direct form 1).

/// Coefficients of one second-order section. `a` omits the leading 1.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BiQuadCoefficients {
    pub b: [f32; 3],
    pub a: [f32; 2],
}

#[derive(Debug, Clone)]
struct BiQuad {
    coefficients: BiQuadCoefficients,
    x: [f32; 2],
    y: [f32; 2],
}

impl BiQuad {
    fn filter_in_place(&mut self, samples: &mut [f32]) {
        let BiQuadCoefficients { b, a } = self.coefficients;
        let [mut x0, mut x1] = self.x;
        let [mut y0, mut y1] = self.y;
        for v in samples.iter_mut() {
            let input = *v;
            let output = b[0] * input + b[1] * x0 + b[2] * x1 - a[0] * y0 - a[1] * y1;
            x1 = x0;
            x0 = input;
            y1 = y0;
            y0 = output;
            *v = output;
        }
        self.x = [x0, x1];
        self.y = [y0, y1];
    }
}

/// Applies its sections in series. An empty cascade is a pass-through.
#[derive(Debug, Clone)]
pub(crate) struct CascadedBiQuadFilter {
    biquads: Vec<BiQuad>,
}

impl CascadedBiQuadFilter {
    pub(crate) fn new(coefficients: &[BiQuadCoefficients]) -> Self {
        Self {
            biquads: coefficients
                .iter()
                .map(|&coefficients| BiQuad {
                    coefficients,
                    x: [0.0; 2],
                    y: [0.0; 2],
                })
                .collect(),
        }
    }

    /// Filters `x` into `y`.
    pub(crate) fn process(&mut self, x: &[f32], y: &mut [f32]) {
        debug_assert_eq!(x.len(), y.len());
        y.copy_from_slice(x);
        self.process_in_place(y);
    }

    pub(crate) fn process_in_place(&mut self, y: &mut [f32]) {
        for bq in &mut self.biquads {
            bq.filter_in_place(y);
        }
    }

    pub(crate) fn reset(&mut self) {
        for bq in &mut self.biquads {
            bq.x = [0.0; 2];
            bq.y = [0.0; 2];
        }
    }
}
