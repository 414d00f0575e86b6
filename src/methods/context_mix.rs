use super::{read_header, write_header, Compressed, CompressionMethod};
use crate::entropy_coders::{RangeDecoder, RangeEncoder};
use crate::error::Result;
use crate::mixers::{ByteMixer, FREQ_TOTAL};
use crate::models::{BytePredictor, MatchModel, PpmPredictor, SparseModel, WordModel};
use std::time::Instant;

const PPM_ORDERS: [usize; 2] = [2, 4];
const MATCH_TABLE_BITS: u32 = 16;
const SOFT_TABLE_BITS: u32 = 16;

/// Byte-level context mixing: PPM at two orders, the longest-match
/// predictor and the soft word/sparse models, geometrically mixed and
/// range coded. Container: LE i64 original size, range payload + flush.
pub struct ContextMix;

fn build_mixer(capacity: usize) -> ByteMixer {
    let predictors: Vec<Box<dyn BytePredictor>> = vec![
        Box::new(PpmPredictor::new(PPM_ORDERS[0])),
        Box::new(PpmPredictor::new(PPM_ORDERS[1])),
        Box::new(MatchModel::new(capacity, MATCH_TABLE_BITS)),
        Box::new(WordModel::new(SOFT_TABLE_BITS)),
        Box::new(SparseModel::new(SOFT_TABLE_BITS)),
    ];
    ByteMixer::new(predictors)
}

impl CompressionMethod for ContextMix {
    fn name(&self) -> &'static str {
        "byte-mix"
    }

    fn compress(&self, data: &[u8]) -> Result<Compressed> {
        let started = Instant::now();
        let mut out = Vec::with_capacity(data.len() / 2 + 16);
        write_header(&mut out, data.len());

        let mut mixer = build_mixer(data.len());
        let mut enc = RangeEncoder::new(out);
        for &byte in data {
            mixer.predict();
            let (cum, freq, total) = mixer.encode_info(byte);
            enc.encode(cum, freq, total)?;
            mixer.update(byte);
        }
        let out = enc.finish()?;
        Ok(Compressed::record(self.name(), data.len(), out, started))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (size, payload) = read_header(data)?;
        let mut mixer = build_mixer(size);
        let mut dec = RangeDecoder::new(payload)?;
        let mut out = Vec::with_capacity(size);
        for _ in 0..size {
            mixer.predict();
            let target = dec.get_freq(FREQ_TOTAL);
            let symbol = mixer.symbol(target);
            let (cum, freq, _) = mixer.encode_info(symbol);
            dec.update(cum, freq)?;
            mixer.update(symbol);
            out.push(symbol);
        }
        Ok(out)
    }
}
