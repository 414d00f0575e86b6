// (c) 2022 Dimitar Rusev <mitikodev@gmail.com> licensed under GPL-3.0

use super::{fnv1a, BytePredictor};
use crate::entropy_coders::{RangeDecoder, RangeEncoder};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{self, Read, Write};

const RESCALE_LIMIT: u32 = 1 << 14;

/// Statistics of one context: `(symbol, freq)` pairs kept sorted by
/// symbol, so cumulative slots follow byte order on both coder sides.
#[derive(Clone)]
pub(crate) struct ContextTable {
    entries: Vec<(u8, u16)>,
    total: u32,
}

impl ContextTable {
    fn new() -> Self {
        Self { entries: Vec::new(), total: 0 }
    }

    fn bump(&mut self, symbol: u8) {
        match self.entries.binary_search_by_key(&symbol, |&(s, _)| s) {
            Ok(i) => self.entries[i].1 += 1,
            Err(i) => self.entries.insert(i, (symbol, 1)),
        }
        self.total += 1;
        if self.total >= RESCALE_LIMIT {
            self.rescale();
        }
    }

    fn rescale(&mut self) {
        self.total = 0;
        for entry in self.entries.iter_mut() {
            entry.1 = (entry.1 >> 1).max(1);
            self.total += u32::from(entry.1);
        }
    }
}

/// PPM context model with PPMD escape estimation and full exclusion.
///
/// Offers two faces: direct range coding (`encode`/`decode`) and
/// distribution extraction for the byte mixer (`predict_distribution`
/// plus `update_model`). The two keep separate exclusion scratch so a
/// mixing host never contaminates a later direct coding call.
pub struct PpmModel {
    max_order: usize,
    tables: Vec<HashMap<u64, ContextTable>>,
    history: Vec<u8>, // last `max_order` bytes, oldest first
    exclusion: [bool; 256],
    pred_exclusion: [bool; 256],
}

impl PpmModel {
    pub fn new(max_order: usize) -> Self {
        Self {
            max_order,
            tables: (0..=max_order).map(|_| HashMap::new()).collect(),
            history: Vec::with_capacity(max_order),
            exclusion: [false; 256],
            pred_exclusion: [false; 256],
        }
    }

    fn context_hash(&self, order: usize) -> u64 {
        if order == 0 {
            0
        } else {
            fnv1a(&self.history[self.history.len() - order..])
        }
    }

    pub fn encode<W: Write>(&mut self, enc: &mut RangeEncoder<W>, symbol: u8) -> io::Result<()> {
        self.exclusion = [false; 256];
        let top = self.max_order.min(self.history.len());
        let mut coded = false;

        for order in (0..=top).rev() {
            let hash = self.context_hash(order);
            let Some(table) = self.tables[order].get(&hash) else {
                continue;
            };

            let mut eff_total = 0u32;
            let mut eff_distinct = 0u32;
            let mut cum = 0u32; // non-excluded mass below `symbol`
            let mut sym_freq = 0u32;
            for &(s, f) in &table.entries {
                if self.exclusion[usize::from(s)] {
                    continue;
                }
                let f = u32::from(f);
                eff_total += f;
                eff_distinct += 1;
                if s < symbol {
                    cum += f;
                } else if s == symbol {
                    sym_freq = f;
                }
            }
            if eff_distinct == 0 {
                continue;
            }

            let esc = (eff_distinct / 2).max(1); // PPMD method D
            let t = eff_total + esc;
            if sym_freq > 0 {
                enc.encode(cum, sym_freq, t)?;
                coded = true;
                break;
            }
            enc.encode(eff_total, esc, t)?;
            for &(s, _) in &table.entries {
                self.exclusion[usize::from(s)] = true;
            }
        }

        if !coded {
            // order -1: uniform over the bytes no visited context claimed
            let mut rank = 0u32;
            let mut remaining = 0u32;
            for b in 0..256 {
                if self.exclusion[b] {
                    continue;
                }
                if b < usize::from(symbol) {
                    rank += 1;
                }
                remaining += 1;
            }
            enc.encode(rank, 1, remaining)?;
        }

        self.update_model(symbol);
        Ok(())
    }

    pub fn decode<R: Read>(&mut self, dec: &mut RangeDecoder<R>) -> Result<u8> {
        self.exclusion = [false; 256];
        let top = self.max_order.min(self.history.len());
        let mut decoded = None;

        for order in (0..=top).rev() {
            let hash = self.context_hash(order);
            let Some(table) = self.tables[order].get(&hash) else {
                continue;
            };

            let mut eff_total = 0u32;
            let mut eff_distinct = 0u32;
            for &(s, f) in &table.entries {
                if !self.exclusion[usize::from(s)] {
                    eff_total += u32::from(f);
                    eff_distinct += 1;
                }
            }
            if eff_distinct == 0 {
                continue;
            }

            let esc = (eff_distinct / 2).max(1);
            let t = eff_total + esc;
            let target = dec.get_freq(t);
            if target < eff_total {
                let mut cum = 0u32;
                let mut hit = None;
                for &(s, f) in &table.entries {
                    if self.exclusion[usize::from(s)] {
                        continue;
                    }
                    let f = u32::from(f);
                    if target < cum + f {
                        hit = Some((s, cum, f));
                        break;
                    }
                    cum += f;
                }
                let (s, cum, f) = hit.ok_or(Error::CorruptStream("ppm symbol slot"))?;
                dec.update(cum, f)?;
                decoded = Some(s);
                break;
            }
            // escape slot [eff_total, eff_total + esc)
            dec.update(eff_total, esc)?;
            for &(s, _) in &table.entries {
                self.exclusion[usize::from(s)] = true;
            }
        }

        let symbol = match decoded {
            Some(s) => s,
            None => {
                let remaining = self.exclusion.iter().filter(|&&e| !e).count() as u32;
                if remaining == 0 {
                    return Err(Error::CorruptStream("ppm order -1 exhausted"));
                }
                let target = dec.get_freq(remaining);
                let mut rank = 0u32;
                let mut found = None;
                for b in 0..=255u8 {
                    if self.exclusion[usize::from(b)] {
                        continue;
                    }
                    if rank == target {
                        found = Some(b);
                        break;
                    }
                    rank += 1;
                }
                let s = found.ok_or(Error::CorruptStream("ppm order -1 slot"))?;
                dec.update(target, 1)?;
                s
            }
        };

        self.update_model(symbol);
        Ok(symbol)
    }

    /// Extracts P(next byte) without touching the coder, for mixing.
    /// Walks orders high to low: each context hands out its symbol mass
    /// scaled by the chance of escaping everything above it, then its
    /// symbols leave the probability space of the orders below.
    pub fn predict_distribution(&mut self, probs: &mut [f32; 256]) {
        self.pred_exclusion = [false; 256];
        probs.fill(0.0);
        let mut escape_prod = 1.0f32;
        let top = self.max_order.min(self.history.len());

        for order in (0..=top).rev() {
            let hash = self.context_hash(order);
            let Some(table) = self.tables[order].get(&hash) else {
                continue;
            };

            let mut eff_total = 0u32;
            let mut eff_distinct = 0u32;
            for &(s, f) in &table.entries {
                if !self.pred_exclusion[usize::from(s)] {
                    eff_total += u32::from(f);
                    eff_distinct += 1;
                }
            }
            if eff_distinct == 0 {
                continue;
            }

            let esc = (eff_distinct / 2).max(1);
            let t = (eff_total + esc) as f32;
            for &(s, f) in &table.entries {
                if !self.pred_exclusion[usize::from(s)] {
                    probs[usize::from(s)] = f32::from(f) * escape_prod / t;
                }
            }
            escape_prod *= esc as f32 / t;
            for &(s, _) in &table.entries {
                self.pred_exclusion[usize::from(s)] = true;
            }
        }

        let remaining = self.pred_exclusion.iter().filter(|&&e| !e).count();
        if remaining > 0 {
            let residual = escape_prod / remaining as f32;
            for (b, p) in probs.iter_mut().enumerate() {
                if !self.pred_exclusion[b] {
                    *p = residual;
                }
            }
        } else {
            // every byte was claimed; fold the escape mass back in
            let sum: f32 = probs.iter().sum();
            for p in probs.iter_mut() {
                *p /= sum;
            }
        }
    }

    /// The per-byte learning step shared by both faces: bump the symbol
    /// in every order's context, then slide the history window. Mixing
    /// hosts must call this exactly once per byte, after coding.
    pub fn update_model(&mut self, symbol: u8) {
        let top = self.max_order.min(self.history.len());
        for order in 0..=top {
            let hash = self.context_hash(order);
            self.tables[order]
                .entry(hash)
                .or_insert_with(ContextTable::new)
                .bump(symbol);
        }
        if self.max_order > 0 {
            if self.history.len() == self.max_order {
                self.history.remove(0);
            }
            self.history.push(symbol);
        }
    }
}

/// Thin façade exposing a `PpmModel` as a mixable byte predictor.
pub struct PpmPredictor {
    model: PpmModel,
}

impl PpmPredictor {
    pub fn new(max_order: usize) -> Self {
        Self { model: PpmModel::new(max_order) }
    }
}

impl BytePredictor for PpmPredictor {
    fn predict(&mut self, probs: &mut [f32; 256]) {
        self.model.predict_distribution(probs);
    }

    fn update(&mut self, symbol: u8) {
        self.model.update_model(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(max_order: usize, data: &[u8]) {
        let mut model = PpmModel::new(max_order);
        let mut enc = RangeEncoder::new(Vec::new());
        for &byte in data {
            model.encode(&mut enc, byte).unwrap();
        }
        let bytes = enc.finish().unwrap();

        let mut model = PpmModel::new(max_order);
        let mut dec = RangeDecoder::new(bytes.as_slice()).unwrap();
        for &byte in data {
            assert_eq!(model.decode(&mut dec).unwrap(), byte);
        }
    }

    #[test]
    fn all_byte_values_order3() {
        let data: Vec<u8> = (0..=255).collect();
        roundtrip(3, &data);

        let mut model = PpmModel::new(3);
        for &byte in &data {
            model.update_model(byte);
        }
        let order0 = &model.tables[0][&0];
        assert_eq!(order0.entries.len(), 256);
    }

    #[test]
    fn repetitive_text_order4() {
        let data = b"the theatre, the thesis, the theory ".repeat(64);
        roundtrip(4, &data);
    }

    #[test]
    fn order_zero_only() {
        roundtrip(0, b"abracadabra");
    }

    #[test]
    fn context_table_invariants() {
        let mut table = ContextTable::new();
        for i in 0..(RESCALE_LIMIT + 100) {
            table.bump((i % 7) as u8);
            table.bump(3);
        }
        assert!(table.total < RESCALE_LIMIT);
        let mut prev = None;
        let mut total = 0u32;
        for &(s, f) in &table.entries {
            assert!(prev.map_or(true, |p| s > p), "symbols out of order");
            assert!(f >= 1);
            prev = Some(s);
            total += u32::from(f);
        }
        assert_eq!(total, table.total);
    }

    #[test]
    fn distribution_sums_to_one() {
        let mut model = PpmModel::new(3);
        let mut probs = [0.0f32; 256];

        // fresh model: pure order -1 uniform
        model.predict_distribution(&mut probs);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);

        for &byte in b"mississippi delta mississippi".iter() {
            model.update_model(byte);
            model.predict_distribution(&mut probs);
            let sum: f32 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "sum {} after byte {}", sum, byte);
        }
        // seen symbols outweigh unseen ones
        assert!(probs[usize::from(b's')] > probs[usize::from(b'z')]);
    }

    #[test]
    fn extraction_does_not_disturb_coding() {
        let data = b"exclusion arrays must stay separate";
        let encode = |interleave_predictions: bool| {
            let mut model = PpmModel::new(3);
            let mut probs = [0.0f32; 256];
            let mut enc = RangeEncoder::new(Vec::new());
            for &byte in data.iter() {
                if interleave_predictions {
                    model.predict_distribution(&mut probs);
                }
                model.encode(&mut enc, byte).unwrap();
            }
            enc.finish().unwrap()
        };
        assert_eq!(encode(false), encode(true));
    }
}
