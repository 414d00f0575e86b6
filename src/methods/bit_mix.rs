use super::{read_header, write_header, Compressed, CompressionMethod};
use crate::entropy_coders::{BinaryDecoder, BinaryEncoder};
use crate::error::Result;
use crate::mixers::BitMixer;
use crate::models::{Apm, BitPredictor, MatchModel, PpmModel};
use crate::models::{fnv1a, fnv1a_pair, fnv1a_step, FNV_OFFSET};
use crate::{u8, usize};
use std::io::{self, Read, Write};
use std::time::Instant;

const PPM_LO_ORDER: usize = 2;
const PPM_HI_ORDER: usize = 4;
const MATCH_TABLE_BITS: u32 = 16;

/// Mixer inputs: two PPM marginals, four bit predictors, one match bit.
const INPUTS: usize = 7;

/// Bit-level context mixing: bytes go through the binary coder MSB
/// first, with byte-level PPM distributions marginalised per bit,
/// logistic mixing and an APM refinement stage. Container: LE i64
/// original size, binary payload + 4 flush bytes.
pub struct BitMix;

/// The partial byte in sentinel form: a leading 1 followed by the bits
/// emitted so far, so every prefix length has a distinct value.
struct BitMixModel {
    ppm_lo: PpmModel,
    ppm_hi: PpmModel,
    matcher: MatchModel,
    bp_partial: BitPredictor,
    bp_prev: BitPredictor,
    bp_order2: BitPredictor,
    bp_word: BitPredictor,
    mixer: BitMixer,
    apm: Apm,
    dist_lo: [f32; 256],
    dist_hi: [f32; 256],
    prev_byte: u8,
    order2_hash: u64,
    word_hash: u64, // rolling hash of the partial word; 0 between words
    preds: [u16; INPUTS],
    ctxs: [u64; 4], // bit-predictor contexts of the current bit
}

impl BitMixModel {
    fn new(capacity: usize) -> Self {
        Self {
            ppm_lo: PpmModel::new(PPM_LO_ORDER),
            ppm_hi: PpmModel::new(PPM_HI_ORDER),
            matcher: MatchModel::new(capacity, MATCH_TABLE_BITS),
            bp_partial: BitPredictor::new(8),
            bp_prev: BitPredictor::new(16),
            bp_order2: BitPredictor::new(18),
            bp_word: BitPredictor::new(18),
            mixer: BitMixer::new(INPUTS),
            apm: Apm::new(8),
            dist_lo: [0.0; 256],
            dist_hi: [0.0; 256],
            prev_byte: 0,
            order2_hash: 0,
            word_hash: 0,
            preds: [0; INPUTS],
            ctxs: [0; 4],
        }
    }

    /// Once-per-byte work: the byte-level PPM distributions every bit
    /// of this byte will marginalise over.
    fn prepare_byte(&mut self) {
        self.ppm_lo.predict_distribution(&mut self.dist_lo);
        self.ppm_hi.predict_distribution(&mut self.dist_hi);
    }

    /// The shared per-bit path. Both coder sides run exactly this, so
    /// the binary coder sees identical probabilities.
    fn bit_probability(&mut self, partial: u32) -> u16 {
        self.ctxs = [
            u64::from(partial),
            u64::from(partial) << 8 | u64::from(self.prev_byte),
            fnv1a_pair(self.order2_hash, u64::from(partial)),
            fnv1a_pair(self.word_hash, u64::from(partial)),
        ];
        self.preds = [
            to_prob16(marginal(&self.dist_lo, partial)),
            to_prob16(marginal(&self.dist_hi, partial)),
            self.bp_partial.predict(self.ctxs[0]),
            self.bp_prev.predict(self.ctxs[1]),
            self.bp_order2.predict(self.ctxs[2]),
            self.bp_word.predict(self.ctxs[3]),
            self.match_bit(partial),
        ];
        let mixed = self.mixer.mix(&self.preds);
        self.apm.map(usize!(partial), mixed)
    }

    /// Match model seen through one bit: if the emitted prefix agrees
    /// with the candidate byte, predict its next bit; any disagreement
    /// collapses to neutral.
    fn match_bit(&self, partial: u32) -> u16 {
        let Some(cand) = self.matcher.predicted_byte() else {
            return 1 << 15;
        };
        let cand = u32::from(cand);
        let depth = bits_known(partial);
        let known = partial - (1 << depth);
        if cand >> (8 - depth) != known {
            return 1 << 15;
        }
        let next = (cand >> (7 - depth)) & 1;
        let conf = (0.85 + (self.matcher.match_len() as f32 - 4.0) * 0.02).clamp(0.85, 0.98);
        to_prob16(if next == 1 { conf } else { 1.0 - conf })
    }

    fn update_bit(&mut self, bit: u8) {
        self.bp_partial.update(self.ctxs[0], bit);
        self.bp_prev.update(self.ctxs[1], bit);
        self.bp_order2.update(self.ctxs[2], bit);
        self.bp_word.update(self.ctxs[3], bit);
        self.mixer.update(bit);
        self.apm.update(bit);
    }

    fn finish_byte(&mut self, byte: u8) {
        self.ppm_lo.update_model(byte);
        self.ppm_hi.update_model(byte);
        self.matcher.push(byte);
        self.order2_hash = fnv1a(&[self.prev_byte, byte]);
        self.prev_byte = byte;
        if byte.is_ascii_alphabetic() {
            let h = if self.word_hash == 0 { FNV_OFFSET } else { self.word_hash };
            self.word_hash = fnv1a_step(h, byte.to_ascii_lowercase());
        } else {
            self.word_hash = 0;
        }
    }

    fn encode_byte<W: Write>(&mut self, enc: &mut BinaryEncoder<W>, byte: u8) -> io::Result<()> {
        self.prepare_byte();
        let mut partial = 1u32;
        for i in 0..8 {
            let bit = (byte >> (7 - i)) & 1;
            let prob = self.bit_probability(partial);
            enc.encode(bit, prob)?;
            self.update_bit(bit);
            partial = (partial << 1) | u32::from(bit);
        }
        self.finish_byte(byte);
        Ok(())
    }

    fn decode_byte<R: Read>(&mut self, dec: &mut BinaryDecoder<R>) -> io::Result<u8> {
        self.prepare_byte();
        let mut partial = 1u32;
        for _ in 0..8 {
            let prob = self.bit_probability(partial);
            let bit = dec.decode(prob)?;
            self.update_bit(bit);
            partial = (partial << 1) | u32::from(bit);
        }
        let byte = u8!(partial & 0xFF);
        self.finish_byte(byte);
        Ok(byte)
    }
}

fn bits_known(partial: u32) -> u32 {
    debug_assert!((1..=255).contains(&partial));
    31 - partial.leading_zeros()
}

/// P(next bit = 1) from a byte distribution: the bytes matching the
/// emitted prefix split into two halves on the bit in question.
fn marginal(dist: &[f32; 256], partial: u32) -> f32 {
    let depth = bits_known(partial) as usize;
    let lo = (usize!(partial) - (1 << depth)) << (8 - depth);
    let half = 1usize << (7 - depth);
    let p0: f32 = dist[lo..lo + half].iter().sum();
    let p1: f32 = dist[lo + half..lo + 2 * half].iter().sum();
    let total = p0 + p1;
    if total > 1e-9 {
        p1 / total
    } else {
        0.5
    }
}

fn to_prob16(p: f32) -> u16 {
    ((p * 65536.0) as i32).clamp(1, 65534) as u16
}

impl CompressionMethod for BitMix {
    fn name(&self) -> &'static str {
        "bit-mix"
    }

    fn compress(&self, data: &[u8]) -> Result<Compressed> {
        let started = Instant::now();
        let mut out = Vec::with_capacity(data.len() / 2 + 16);
        write_header(&mut out, data.len());

        let mut model = BitMixModel::new(data.len());
        let mut enc = BinaryEncoder::new(out);
        for &byte in data {
            model.encode_byte(&mut enc, byte)?;
        }
        let out = enc.finish()?;
        Ok(Compressed::record(self.name(), data.len(), out, started))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (size, payload) = read_header(data)?;
        let mut model = BitMixModel::new(size);
        let mut dec = BinaryDecoder::new(payload)?;
        let mut out = Vec::with_capacity(size);
        for _ in 0..size {
            out.push(model.decode_byte(&mut dec)?);
        }
        Ok(out)
    }
}
