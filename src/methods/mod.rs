// (c) 2022 Dimitar Rusev <mitikodev@gmail.com> licensed under GPL-3.0

pub mod bit_mix;
pub mod context_mix;
pub mod order0_arith;
pub mod ppm;

pub use self::{bit_mix::BitMix, context_mix::ContextMix, order0_arith::Order0Arith, ppm::PpmMethod};

use crate::error::{Error, Result};
use crate::usize;
use std::time::{Duration, Instant};

/// Outcome of one compress call, in the shape the pipeline layer
/// consumes. `data` carries the full container including headers.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub method: &'static str,
    pub original_size: i64,
    pub compressed_size: i64,
    pub aux_size: i64,
    pub data: Vec<u8>,
    pub duration: Duration,
    pub lossless: bool,
}

impl Compressed {
    fn record(method: &'static str, original: usize, data: Vec<u8>, started: Instant) -> Self {
        Self {
            method,
            original_size: original as i64,
            compressed_size: data.len() as i64,
            aux_size: 0,
            data,
            duration: started.elapsed(),
            lossless: true,
        }
    }
}

/// One self-contained compression scheme: a model stack bound to an
/// entropy coder, with its own container framing.
pub trait CompressionMethod {
    fn name(&self) -> &'static str;
    fn compress(&self, data: &[u8]) -> Result<Compressed>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// The lossless contract every method must satisfy.
pub fn verify(method: &dyn CompressionMethod, data: &[u8]) -> Result<bool> {
    let compressed = method.compress(data)?;
    Ok(method.decompress(&compressed.data)? == data)
}

pub(crate) fn write_header(out: &mut Vec<u8>, size: usize) {
    out.extend_from_slice(&(size as i64).to_le_bytes());
}

pub(crate) fn read_header(data: &[u8]) -> Result<(usize, &[u8])> {
    if data.len() < 8 {
        return Err(Error::CorruptStream("truncated size header"));
    }
    let size = i64::from_le_bytes(data[..8].try_into().unwrap());
    if size < 0 {
        return Err(Error::CorruptStream("negative original size"));
    }
    Ok((usize!(size), &data[8..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut out = Vec::new();
        write_header(&mut out, 123_456);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 0x40); // little-endian low byte first
        let (size, rest) = read_header(&out).unwrap();
        assert_eq!(size, 123_456);
        assert!(rest.is_empty());
    }

    #[test]
    fn short_and_negative_headers_are_rejected() {
        assert!(matches!(read_header(&[1, 2, 3]), Err(Error::CorruptStream(_))));
        let negative = (-1i64).to_le_bytes();
        assert!(matches!(read_header(&negative), Err(Error::CorruptStream(_))));
    }

    #[test]
    fn verify_runs_the_full_contract() {
        let data = b"verify me";
        assert!(verify(&Order0Arith, data).unwrap());
        assert!(verify(&PpmMethod::new(3), data).unwrap());
        assert!(verify(&ContextMix, data).unwrap());
        assert!(verify(&BitMix, data).unwrap());
    }
}
