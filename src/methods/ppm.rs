use super::{read_header, write_header, Compressed, CompressionMethod};
use crate::entropy_coders::{RangeDecoder, RangeEncoder};
use crate::error::{Error, Result};
use crate::models::PpmModel;
use std::time::Instant;

/// PPM with PPMD escapes, coded directly by the range coder.
/// Container: LE i64 original size, u8 order, range payload + flush.
pub struct PpmMethod {
    order: u8,
}

impl PpmMethod {
    pub fn new(order: u8) -> Self {
        Self { order }
    }
}

impl Default for PpmMethod {
    fn default() -> Self {
        Self::new(4)
    }
}

impl CompressionMethod for PpmMethod {
    fn name(&self) -> &'static str {
        "ppm"
    }

    fn compress(&self, data: &[u8]) -> Result<Compressed> {
        let started = Instant::now();
        let mut out = Vec::with_capacity(data.len() / 2 + 16);
        write_header(&mut out, data.len());
        out.push(self.order);

        let mut model = PpmModel::new(usize::from(self.order));
        let mut enc = RangeEncoder::new(out);
        for &byte in data {
            model.encode(&mut enc, byte)?;
        }
        let out = enc.finish()?;
        Ok(Compressed::record(self.name(), data.len(), out, started))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (size, payload) = read_header(data)?;
        let Some((&order, payload)) = payload.split_first() else {
            return Err(Error::CorruptStream("missing ppm order"));
        };

        let mut model = PpmModel::new(usize::from(order));
        let mut dec = RangeDecoder::new(payload)?;
        let mut out = Vec::with_capacity(size);
        for _ in 0..size {
            out.push(model.decode(&mut dec)?);
        }
        Ok(out)
    }
}
