use super::{ByteReader, TOP};
use crate::u8;
use std::io::{self, Read, Write};

/// Largest total a frequency table may present to the coder. Keeps
/// `range / total` at least 2^8 after renormalization.
pub const MAX_TOTAL: u32 = 1 << 16;

/// Byte-oriented range coder over `(cum_freq, freq, total)` triples.
///
/// `low` is 64-bit on purpose: bit 32 holds the carry that a late
/// increment can push past the already-buffered output bytes.
pub struct RangeEncoder<W> {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64, // buffered 0xFF bytes behind `cache`
    io: W,
}

impl<W: Write> RangeEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self { low: 0, range: u32::MAX, cache: 0, cache_size: 0, io: writer }
    }

    pub fn encode(&mut self, cum_freq: u32, freq: u32, total: u32) -> io::Result<()> {
        assert!(freq > 0, "zero symbol frequency");
        assert!(cum_freq + freq <= total, "frequency interval exceeds total");
        assert!(total < MAX_TOTAL, "total out of range");

        self.range /= total;
        self.low += u64::from(cum_freq) * u64::from(self.range);
        self.range *= freq;

        while self.range < TOP {
            self.shift_low()?;
            self.range <<= 8;
        }
        debug_assert!(self.range >= TOP);
        Ok(())
    }

    // Schindler/Subbotin carry cache: the top byte of `low` stays
    // buffered until a non-0xFF byte (or a carry) settles it.
    fn shift_low(&mut self) -> io::Result<()> {
        let carry = u8!(self.low >> 32);
        let top = u8!((self.low >> 24) & 0xFF);
        if carry == 1 || top != 0xFF {
            self.io.write_all(&[self.cache.wrapping_add(carry)])?;
            for _ in 0..self.cache_size {
                self.io.write_all(&[0xFFu8.wrapping_add(carry)])?;
            }
            self.cache = top;
            self.cache_size = 0;
        } else {
            self.cache_size += 1;
        }
        self.low = (self.low << 8) & 0xFFFF_FFFF;
        Ok(())
    }

    /// Drains the interval (5 shifts, same count the decoder primes with)
    /// and returns the sink.
    pub fn finish(mut self) -> io::Result<W> {
        for _ in 0..5 {
            self.shift_low()?;
        }
        self.io.flush()?;
        Ok(self.io)
    }
}

/// Decoder half. `low` mirrors the encoder interval; `code` is the
/// 32-bit window of the encoded value sliding along with it.
pub struct RangeDecoder<R> {
    low: u32,
    code: u32,
    range: u32,
    io: ByteReader<R>,
}

impl<R: Read> RangeDecoder<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        let mut io = ByteReader::new(reader);
        let mut code = 0u32;
        for _ in 0..5 {
            code = (code << 8) | u32::from(io.read_byte()?);
        }
        Ok(Self { low: 0, code, range: u32::MAX, io })
    }

    /// Returns the cumulative slot of the next symbol. Divides `range`
    /// down by `total`; the matching `update` call must follow before
    /// the next `get_freq`.
    pub fn get_freq(&mut self, total: u32) -> u32 {
        debug_assert!(total > 0 && total < MAX_TOTAL, "total out of range");
        self.range /= total;
        let target = self.code.wrapping_sub(self.low) / self.range;
        // rounding at the stream tail can overshoot by one slot
        target.min(total - 1)
    }

    pub fn update(&mut self, cum_freq: u32, freq: u32) -> io::Result<()> {
        debug_assert!(freq > 0, "zero symbol frequency");
        self.low = self.low.wrapping_add(cum_freq * self.range);
        self.range *= freq;

        while self.range < TOP {
            self.code = (self.code << 8) | u32::from(self.io.read_byte()?);
            self.low <<= 8;
            self.range <<= 8;
        }
        Ok(())
    }
}
