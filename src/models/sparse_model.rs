use super::{add_soft_component, fnv1a_step, BytePredictor, PredictionTable, FNV_OFFSET};
use crate::u8;

/// Gap patterns, as distances back from the next byte. Skipping
/// adjacent bytes catches periodic structure the order-n contexts miss.
const PATTERNS: [[usize; 3]; 3] = [[1, 3, 5], [1, 2, 4], [2, 4, 8]];

/// Soft predictor over non-adjacent byte offsets.
pub struct SparseModel {
    tables: [PredictionTable; 3],
    window: u64, // last 8 bytes, most recent in the low byte
    seen: usize,
}

impl SparseModel {
    pub fn new(table_bits: u32) -> Self {
        Self {
            tables: [
                PredictionTable::new(table_bits),
                PredictionTable::new(table_bits),
                PredictionTable::new(table_bits),
            ],
            window: 0,
            seen: 0,
        }
    }

    fn pattern_hash(&self, pattern: usize) -> Option<u64> {
        let offsets = &PATTERNS[pattern];
        if self.seen < offsets[2] {
            return None;
        }
        let mut h = FNV_OFFSET;
        for &off in offsets {
            h = fnv1a_step(h, u8!((self.window >> ((off - 1) * 8)) & 0xFF));
        }
        Some(h)
    }
}

impl BytePredictor for SparseModel {
    fn predict(&mut self, probs: &mut [f32; 256]) {
        probs.fill(0.0);
        for (pattern, table) in self.tables.iter().enumerate() {
            let component = self.pattern_hash(pattern).and_then(|h| table.boost(h));
            add_soft_component(probs, component, 1.0 / 3.0);
        }
    }

    fn update(&mut self, symbol: u8) {
        for (pattern, table) in self.tables.iter_mut().enumerate() {
            let offsets = &PATTERNS[pattern];
            if self.seen < offsets[2] {
                continue;
            }
            let mut h = FNV_OFFSET;
            for &off in offsets {
                h = fnv1a_step(h, u8!((self.window >> ((off - 1) * 8)) & 0xFF));
            }
            table.observe(h, symbol);
        }
        self.window = (self.window << 8) | u64::from(symbol);
        self.seen += 1;
    }
}
