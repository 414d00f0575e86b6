use super::{ByteReader, TOP};
use crate::{u32, u8};
use std::io::{self, Read, Write};

/// Bit-level arithmetic coder over `(bit, prob)` pairs, where `prob` is
/// P(bit = 1) scaled to `[1, 65534]`.
pub struct BinaryEncoder<W> {
    x1: u32, // low
    x2: u32, // high
    io: W,
}

impl<W: Write> BinaryEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self { x1: 0, x2: u32::MAX, io: writer }
    }

    pub fn encode(&mut self, bit: u8, prob: u16) -> io::Result<()> {
        assert!((1..=65534).contains(&prob), "probability out of range");
        let xmid = lerp(self.x1, self.x2, prob);

        // Update range (kinda like binary search)
        match bit {
            0 => self.x1 = xmid + 1,
            _ => self.x2 = xmid,
        }

        // Renormalize range -> settled top bytes go to the stream
        while (self.x1 ^ self.x2) < TOP {
            self.io.write_all(&[u8!(self.x2 >> 24)])?;
            self.x1 <<= 8;
            self.x2 = (self.x2 << 8) | 0xFF;
        }
        Ok(())
    }

    /// Pins the final value to `x1` and returns the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.io.write_all(&self.x1.to_be_bytes())?;
        self.io.flush()?;
        Ok(self.io)
    }
}

pub struct BinaryDecoder<R> {
    x1: u32, // low
    x2: u32, // high
    code: u32,
    io: ByteReader<R>,
}

impl<R: Read> BinaryDecoder<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        let mut io = ByteReader::new(reader);
        let mut code = 0u32;
        for _ in 0..4 {
            code = (code << 8) | u32::from(io.read_byte()?);
        }
        Ok(Self { x1: 0, x2: u32::MAX, code, io })
    }

    pub fn decode(&mut self, prob: u16) -> io::Result<u8> {
        let xmid = lerp(self.x1, self.x2, prob);
        let bit = u8::from(self.code <= xmid);

        // Update range (kinda like binary search)
        match bit {
            0 => self.x1 = xmid + 1,
            _ => self.x2 = xmid,
        }

        // Renormalize range -> pull fresh low bytes into the window
        while (self.x1 ^ self.x2) < TOP {
            self.x1 <<= 8;
            self.x2 = (self.x2 << 8) | 0xFF;
            self.code = (self.code << 8) | u32::from(self.io.read_byte()?);
        }
        Ok(bit)
    }
}

#[inline(always)]
fn lerp(x1: u32, x2: u32, prob: u16) -> u32 {
    let range = u64::from(x2 - x1);
    let xmid = x1 + u32!((range * u64::from(prob)) >> 16);
    debug_assert!(xmid >= x1 && xmid < x2);
    xmid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn roundtrip(bits: &[u8], probs: &[u16]) -> usize {
        let mut enc = BinaryEncoder::new(Vec::new());
        for (&bit, &prob) in bits.iter().zip(probs) {
            enc.encode(bit, prob).unwrap();
        }
        let bytes = enc.finish().unwrap();

        let mut dec = BinaryDecoder::new(bytes.as_slice()).unwrap();
        for (&bit, &prob) in bits.iter().zip(probs) {
            assert_eq!(dec.decode(prob).unwrap(), bit);
        }
        bytes.len()
    }

    #[test]
    fn certain_bits_are_nearly_free() {
        let n = 4096;
        let bits = [1u8].repeat(n);
        let probs = [65534u16].repeat(n);
        let len = roundtrip(&bits, &probs);
        assert!(len <= n / 8 + 4, "{} bytes for {} near-certain bits", len, n);
    }

    #[test]
    fn uncertain_bits_cost_one_bit_each() {
        let n = 1024;
        let bits: Vec<u8> = (0..n).map(|i| u8::from(i % 3 == 0)).collect();
        let probs = [1u16 << 15].repeat(n);
        let len = roundtrip(&bits, &probs);
        assert!(len <= n / 8 + 5);
    }

    #[test]
    fn mispredicted_bits_still_roundtrip() {
        let n = 256;
        let bits = [0u8].repeat(n);
        let probs = [65534u16].repeat(n);
        roundtrip(&bits, &probs);
    }

    #[test]
    fn random_bits_random_probs() {
        let mut rng = StdRng::seed_from_u64(0xb17);
        let bits: Vec<u8> = (0..8192).map(|_| rng.gen_range(0..=1)).collect();
        let probs: Vec<u16> = (0..8192).map(|_| rng.gen_range(1..=65534)).collect();
        roundtrip(&bits, &probs);
    }
}
