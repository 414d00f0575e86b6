use crate::models::BytePredictor;
use crate::{u32, u8};

/// Quantised distribution total. Leaves headroom below the range
/// coder's 2^16 ceiling.
pub const FREQ_TOTAL: u32 = 65280;

/// Probability floor inside the log mix, e^-20.
const MIN_PROB: f32 = 2.061_153_6e-9;

const LEARNING_RATE: f32 = 0.005;

/// Geometric mixer over byte predictors: a weighted mean in log space,
/// quantised to an integer frequency table for the range coder.
///
/// In log space a uniform input is a constant that cancels under
/// normalization, so a specialist predictor with nothing to say stays
/// silent instead of flattening the others.
pub struct ByteMixer {
    predictors: Vec<Box<dyn BytePredictor>>,
    weights: Vec<f32>,
    predictions: Vec<[f32; 256]>,
    log_mix: [f32; 256],
    mix: [f32; 256],
    freq: [u32; 256],
    cum: [u32; 257],
}

impl ByteMixer {
    pub fn new(predictors: Vec<Box<dyn BytePredictor>>) -> Self {
        let k = predictors.len();
        let weights = vec![1.0 / k as f32; k];
        Self::with_weights(predictors, weights)
    }

    pub fn with_weights(predictors: Vec<Box<dyn BytePredictor>>, weights: Vec<f32>) -> Self {
        let k = predictors.len();
        assert!(k > 0, "mixer needs at least one predictor");
        assert_eq!(weights.len(), k, "one weight per predictor");
        let sum: f32 = weights.iter().sum();
        let weights = weights.iter().map(|w| w / sum).collect();
        Self {
            predictors,
            weights,
            predictions: vec![[0.0; 256]; k],
            log_mix: [0.0; 256],
            mix: [0.0; 256],
            freq: [0; 256],
            cum: [0; 257],
        }
    }

    /// Gathers all predictions, mixes, and rebuilds the frequency
    /// table consumed by `encode_info`/`symbol`.
    pub fn predict(&mut self) {
        for (predictor, scratch) in self.predictors.iter_mut().zip(self.predictions.iter_mut()) {
            predictor.predict(scratch);
        }

        for s in 0..256 {
            let mut acc = 0.0f32;
            for (weight, prediction) in self.weights.iter().zip(&self.predictions) {
                acc += weight * prediction[s].max(MIN_PROB).ln();
            }
            self.log_mix[s] = acc;
        }

        // max-shift before exp keeps the same f32 operations on both
        // coder sides regardless of magnitude
        let max = self.log_mix.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0f32;
        for s in 0..256 {
            self.mix[s] = (self.log_mix[s] - max).exp();
            sum += self.mix[s];
        }
        for m in self.mix.iter_mut() {
            *m /= sum;
        }

        self.quantise();
    }

    fn quantise(&mut self) {
        let mut total = 0i64;
        let mut mode = 0usize;
        for s in 0..256 {
            if self.mix[s] > self.mix[mode] {
                mode = s;
            }
            self.freq[s] = ((self.mix[s] * FREQ_TOTAL as f32).round() as u32).max(1);
            total += i64::from(self.freq[s]);
        }
        // rounding residual lands on the mode
        let residual = i64::from(FREQ_TOTAL) - total;
        self.freq[mode] = u32!((i64::from(self.freq[mode]) + residual).max(1));

        let mut acc = 0u32;
        for s in 0..256 {
            self.cum[s] = acc;
            acc += self.freq[s];
        }
        self.cum[256] = acc;
        debug_assert_eq!(acc, FREQ_TOTAL);
    }

    pub fn encode_info(&self, symbol: u8) -> (u32, u32, u32) {
        let s = usize::from(symbol);
        (self.cum[s], self.freq[s], FREQ_TOTAL)
    }

    /// Largest symbol whose cumulative start is at or below `cum_value`.
    pub fn symbol(&self, cum_value: u32) -> u8 {
        debug_assert!(cum_value < FREQ_TOTAL);
        u8!(self.cum[1..].partition_point(|&c| c <= cum_value))
    }

    /// Scores every predictor on the observed symbol, smooths the
    /// weights toward the winners, then lets all predictors learn.
    pub fn update(&mut self, symbol: u8) {
        let s = usize::from(symbol);
        let max_score = self
            .predictions
            .iter()
            .map(|p| p[s])
            .fold(0.0f32, f32::max);

        if max_score >= 1e-10 {
            let mut sum = 0.0f32;
            for (weight, prediction) in self.weights.iter_mut().zip(&self.predictions) {
                *weight = (1.0 - LEARNING_RATE) * *weight
                    + LEARNING_RATE * (prediction[s] / max_score);
                sum += *weight;
            }
            for weight in self.weights.iter_mut() {
                *weight /= sum;
            }
        }

        for predictor in self.predictors.iter_mut() {
            predictor.update(symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always predicts one byte with the given confidence.
    struct Stub {
        byte: u8,
        conf: f32,
    }

    impl Stub {
        fn boxed(byte: u8, conf: f32) -> Box<dyn BytePredictor> {
            Box::new(Stub { byte, conf })
        }
    }

    impl BytePredictor for Stub {
        fn predict(&mut self, probs: &mut [f32; 256]) {
            probs.fill((1.0 - self.conf) / 255.0);
            probs[usize::from(self.byte)] = self.conf;
        }

        fn update(&mut self, _symbol: u8) {}
    }

    #[test]
    fn quantised_table_is_exact() {
        let mut mixer = ByteMixer::new(vec![Stub::boxed(b'a', 0.9), Stub::boxed(b'b', 0.6)]);
        mixer.predict();
        assert_eq!(mixer.cum[256], FREQ_TOTAL);
        assert!(mixer.freq.iter().all(|&f| f >= 1));
        assert_eq!(mixer.freq.iter().sum::<u32>(), FREQ_TOTAL);
    }

    #[test]
    fn symbol_inverts_encode_info() {
        let mut mixer = ByteMixer::new(vec![Stub::boxed(b'q', 0.8)]);
        mixer.predict();
        for s in [0u8, b'q', 255] {
            let (cum, freq, _) = mixer.encode_info(s);
            assert_eq!(mixer.symbol(cum), s);
            assert_eq!(mixer.symbol(cum + freq - 1), s);
        }
    }

    #[test]
    fn uniform_predictor_adds_no_bias() {
        let mut alone = ByteMixer::new(vec![Stub::boxed(b'x', 0.9)]);
        alone.predict();

        let mut diluted = ByteMixer::new(vec![
            Stub::boxed(b'x', 0.9),
            Stub::boxed(0, 1.0 / 256.0), // exactly uniform
        ]);
        diluted.predict();

        // the uniform voice costs mixing weight but injects no
        // preference of its own: the peaked predictor keeps the mode
        // and its odds soften exactly to their square root
        let x = usize::from(b'x');
        assert_eq!(diluted.symbol(diluted.cum[x]), b'x');
        let ratio = |m: &ByteMixer| m.freq[x] as f32 / m.freq[usize::from(b'y')] as f32;
        let expected = ratio(&alone).sqrt();
        let actual = ratio(&diluted);
        assert!(
            (actual / expected - 1.0).abs() < 0.1,
            "expected odds {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn weights_drift_toward_the_better_predictor() {
        let mut mixer = ByteMixer::new(vec![Stub::boxed(b'k', 0.9), Stub::boxed(b'z', 0.9)]);
        for _ in 0..200 {
            mixer.predict();
            mixer.update(b'k');
        }
        assert!(mixer.weights[0] > 0.8);
        assert!((mixer.weights.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn every_predictor_learns_each_byte() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct Counting {
            count: Rc<Cell<usize>>,
        }

        impl BytePredictor for Counting {
            fn predict(&mut self, probs: &mut [f32; 256]) {
                probs.fill(1.0 / 256.0);
            }
            fn update(&mut self, _symbol: u8) {
                self.count.set(self.count.get() + 1);
            }
        }

        let counts = [Rc::new(Cell::new(0)), Rc::new(Cell::new(0))];
        let mut mixer = ByteMixer::new(vec![
            Box::new(Counting { count: counts[0].clone() }),
            Box::new(Counting { count: counts[1].clone() }),
        ]);
        for byte in [5u8, 6, 7] {
            mixer.predict();
            mixer.update(byte);
        }
        assert_eq!((counts[0].get(), counts[1].get()), (3, 3));
    }
}
