pub mod apm;
pub mod bit_predictor;
pub mod match_model;
pub mod order0;
pub mod ppm;
pub mod sparse_model;
pub mod word_model;

pub use self::{
    apm::Apm, bit_predictor::BitPredictor, match_model::MatchModel, order0::Order0Model,
    ppm::PpmModel, ppm::PpmPredictor, sparse_model::SparseModel, word_model::WordModel,
};

use crate::usize;

/// A byte-level predictor feeding the geometric mixer.
///
/// `predict` fills a distribution over the next byte (summing to ~1);
/// `update` observes the byte that actually occurred. The mixer calls
/// them strictly in that order, once each per coded byte.
pub trait BytePredictor {
    fn predict(&mut self, probs: &mut [f32; 256]);
    fn update(&mut self, symbol: u8);
}

pub(crate) const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
pub(crate) const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub(crate) fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, &b| fnv1a_step(h, b))
}

pub(crate) fn fnv1a_step(h: u64, byte: u8) -> u64 {
    (h ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
}

pub(crate) fn fnv1a_pair(a: u64, b: u64) -> u64 {
    b.to_le_bytes().iter().fold(a, |h, &byte| fnv1a_step(h, byte))
}

/// Hash-indexed `{predicted byte, count}` slots shared by the soft
/// predictors (word and sparse contexts).
pub(crate) struct PredictionTable {
    slots: Vec<Slot>,
    mask: u64,
}

#[derive(Clone, Copy, Default)]
struct Slot {
    predicted: u8,
    count: u8,
}

impl PredictionTable {
    pub(crate) fn new(table_bits: u32) -> Self {
        let size = 1usize << table_bits;
        Self { slots: vec![Slot::default(); size], mask: (size - 1) as u64 }
    }

    /// Predicted byte and boost strength, once a slot has proven itself.
    pub(crate) fn boost(&self, hash: u64) -> Option<(u8, f32)> {
        let slot = self.slots[usize!(hash & self.mask)];
        (slot.count >= 3).then(|| (slot.predicted, (f32::from(slot.count) * 0.015).min(0.4)))
    }

    /// Hit: reinforce. Miss on a weak slot: overwrite. Miss on a strong
    /// slot: decay toward replaceable.
    pub(crate) fn observe(&mut self, hash: u64, symbol: u8) {
        let slot = &mut self.slots[usize!(hash & self.mask)];
        if slot.count > 0 && slot.predicted == symbol {
            slot.count = slot.count.saturating_add(1);
        } else if slot.count <= 1 {
            slot.predicted = symbol;
            slot.count = 1;
        } else {
            slot.count >>= 1;
        }
    }
}

/// Accumulates one soft component into `probs`: a peak at the predicted
/// byte shallow enough that geometric mixing cannot blank other bytes.
pub(crate) fn add_soft_component(
    probs: &mut [f32; 256],
    component: Option<(u8, f32)>,
    weight: f32,
) {
    match component {
        Some((byte, boost)) => {
            let peak = weight * (1.0 + boost * 255.0) / 256.0;
            let rest = weight * (1.0 - boost) / 256.0;
            for p in probs.iter_mut() {
                *p += rest;
            }
            probs[usize::from(byte)] += peak - rest;
        }
        None => {
            for p in probs.iter_mut() {
                *p += weight / 256.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_table_lifecycle() {
        let mut table = PredictionTable::new(8);
        let h = 0x1234;
        assert!(table.boost(h).is_none());

        // two observations are not yet trusted
        table.observe(h, b'x');
        table.observe(h, b'x');
        assert!(table.boost(h).is_none());
        table.observe(h, b'x');
        let (byte, boost) = table.boost(h).unwrap();
        assert_eq!(byte, b'x');
        assert!(boost > 0.0 && boost <= 0.4);

        // misses halve the count down to replaceable, then overwrite
        table.observe(h, b'y');
        table.observe(h, b'y');
        table.observe(h, b'y');
        assert_eq!(table.slots[usize!(h & table.mask)].predicted, b'y');
    }

    #[test]
    fn soft_component_sums_to_weight() {
        let mut probs = [0.0f32; 256];
        add_soft_component(&mut probs, Some((b'a', 0.4)), 1.0);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(probs[usize::from(b'a')] > probs[0]);
    }
}
