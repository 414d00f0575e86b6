use super::{read_header, write_header, Compressed, CompressionMethod};
use crate::entropy_coders::{RangeDecoder, RangeEncoder};
use crate::error::Result;
use crate::models::Order0Model;
use std::time::Instant;

/// Order-0 adaptive arithmetic coding: the flat frequency table fed
/// straight into the range coder. Container: LE i64 original size,
/// range payload, 5 flush bytes.
pub struct Order0Arith;

impl CompressionMethod for Order0Arith {
    fn name(&self) -> &'static str {
        "order0-arith"
    }

    fn compress(&self, data: &[u8]) -> Result<Compressed> {
        let started = Instant::now();
        let mut out = Vec::with_capacity(data.len() / 2 + 16);
        write_header(&mut out, data.len());

        let mut model = Order0Model::new();
        let mut enc = RangeEncoder::new(out);
        for &byte in data {
            let (cum, freq, total) = model.encode_info(byte);
            enc.encode(cum, freq, total)?;
            model.update(byte);
        }
        let out = enc.finish()?;
        Ok(Compressed::record(self.name(), data.len(), out, started))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (size, payload) = read_header(data)?;
        let mut model = Order0Model::new();
        let mut dec = RangeDecoder::new(payload)?;
        let mut out = Vec::with_capacity(size);
        for _ in 0..size {
            let target = dec.get_freq(model.total());
            let symbol = model.symbol(target);
            let (cum, freq, _) = model.encode_info(symbol);
            dec.update(cum, freq)?;
            model.update(symbol);
            out.push(symbol);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::entropy;
    use crate::methods::verify;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn single_symbol_run_is_nearly_free() {
        let compressed = Order0Arith.compress(b"aaaaaaaaaa").unwrap();
        // 8 byte header + 5 flush bytes + almost no payload
        assert!(compressed.data.len() <= 20, "{} bytes", compressed.data.len());
        assert_eq!(Order0Arith.decompress(&compressed.data).unwrap(), b"aaaaaaaaaa");
    }

    #[test]
    fn rescale_stays_in_lockstep() {
        let data = [0x42u8].repeat((1 << 14) + 10);
        assert!(verify(&Order0Arith, &data).unwrap());
    }

    #[test]
    fn empty_input() {
        let compressed = Order0Arith.compress(b"").unwrap();
        assert_eq!(compressed.data.len(), 8 + 5);
        assert_eq!(Order0Arith.decompress(&compressed.data).unwrap(), b"");
    }

    #[test]
    fn biased_stream_reaches_the_entropy_bound() {
        let mut rng = StdRng::seed_from_u64(0xa11ce);
        let data: Vec<u8> = (0..65536)
            .map(|_| if rng.gen_bool(0.5) { b'A' } else { rng.gen() })
            .collect();

        let compressed = Order0Arith.compress(&data).unwrap();
        let bound = entropy(&data) * data.len() as f64 / 8.0;
        let payload = (compressed.data.len() - 8) as f64;
        assert!(
            (payload - bound).abs() <= bound * 0.05,
            "payload {} vs entropy bound {}",
            payload,
            bound
        );
        assert_eq!(Order0Arith.decompress(&compressed.data).unwrap(), data);
    }

    #[test]
    fn identity_sequence() {
        let data: Vec<u8> = (0..=255).collect();
        assert!(verify(&Order0Arith, &data).unwrap());
    }
}
