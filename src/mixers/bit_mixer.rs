use crate::u16;
use std::sync::OnceLock;

const SQUASH_CELLS: usize = 4096;
const LOGIT_RANGE: f32 = 16.0;
const LEARNING_RATE: f32 = 0.003;

struct Luts {
    stretch: Vec<f32>,
    squash: Vec<f32>,
}

// Immutable after first use; the only process-wide state in the crate.
static LUTS: OnceLock<Luts> = OnceLock::new();

fn luts() -> &'static Luts {
    LUTS.get_or_init(|| {
        let mut stretch = vec![0.0f32; 65536];
        for (i, s) in stretch.iter_mut().enumerate().take(65535).skip(1) {
            *s = (i as f32 / (65535 - i) as f32).ln();
        }
        // ends extended from their neighbours; the mixer clamps its
        // inputs to [1, 65534] so these are defensive only
        stretch[0] = stretch[1];
        stretch[65535] = stretch[65534];

        let mut squash = vec![0.0f32; SQUASH_CELLS + 1];
        for (j, q) in squash.iter_mut().enumerate() {
            let x = -LOGIT_RANGE + 2.0 * LOGIT_RANGE * j as f32 / SQUASH_CELLS as f32;
            *q = (65535.0 / (1.0 + (-x).exp())).clamp(1.0, 65534.0);
        }
        Luts { stretch, squash }
    })
}

/// Probability to log-odds, `ln(p / (65535 - p))`.
pub fn stretch(prob: u16) -> f32 {
    luts().stretch[usize::from(prob)]
}

/// Log-odds back to a probability in `[1, 65534]`, interpolating
/// between LUT cells.
pub fn squash(logit: f32) -> u16 {
    let x = logit.clamp(-LOGIT_RANGE, LOGIT_RANGE);
    let pos = (x + LOGIT_RANGE) * (SQUASH_CELLS as f32 / (2.0 * LOGIT_RANGE));
    let idx = (pos as usize).min(SQUASH_CELLS - 1);
    let frac = pos - idx as f32;
    let table = &luts().squash;
    let p = (table[idx] + (table[idx + 1] - table[idx]) * frac).round();
    u16!((p as u32).clamp(1, 65534))
}

/// Logistic mixer: weighted sum of stretched bit predictions, squashed
/// back to a probability. Weights adapt by gradient descent on coding
/// loss and are free to take any sign.
pub struct BitMixer {
    weights: Vec<f32>,
    stretched: Vec<f32>,
    logit: f32,
}

impl BitMixer {
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "mixer needs at least one input");
        Self {
            weights: vec![1.0 / n as f32; n],
            stretched: vec![0.0; n],
            logit: 0.0,
        }
    }

    pub fn mix(&mut self, preds: &[u16]) -> u16 {
        debug_assert_eq!(preds.len(), self.weights.len());
        let mut logit = 0.0f32;
        for (i, &p) in preds.iter().enumerate() {
            let l = stretch(p);
            self.stretched[i] = l;
            logit += self.weights[i] * l;
        }
        self.logit = logit;
        squash(logit)
    }

    /// Must follow the matching `mix` call, once the bit is known.
    pub fn update(&mut self, bit: u8) {
        let p = f32::from(squash(self.logit)) / 65535.0;
        let err = (f32::from(bit) - p) * LEARNING_RATE;
        for (weight, &l) in self.weights.iter_mut().zip(&self.stretched) {
            *weight += err * l;
        }
    }
}
