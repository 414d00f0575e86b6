pub mod binary_coder;
pub mod range_coder;

pub use binary_coder::{BinaryDecoder, BinaryEncoder};
pub use range_coder::{RangeDecoder, RangeEncoder};

use core::slice::from_mut as into_slice;
use std::io::{self, ErrorKind, Read};

/// Renormalization threshold shared by both coders.
pub(crate) const TOP: u32 = 1 << 24;

/// Byte reader for the decoders. Reads past end-of-input yield 0, so a
/// decoder can drain its tail without the sink having to pad the stream.
pub(crate) struct ByteReader<R> {
    inner: R,
}

impl<R: Read> ByteReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner }
    }

    pub(crate) fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = 0;
        let result = self.inner.read_exact(into_slice(&mut byte));

        match result {
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(0),
            _ => result.map(|_| byte),
        }
    }
}
