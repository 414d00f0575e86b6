use super::{fnv1a, BytePredictor};
use crate::{u32, usize};

/// Context length that has to re-verify before a match starts.
const MATCH_ORDER: usize = 4;

/// Longest-match predictor: remembers where the current 4-byte context
/// last occurred and predicts the byte that followed it, with
/// confidence growing in the match length.
pub struct MatchModel {
    buf: Vec<u8>,
    table: Vec<u32>, // position of the byte after the context; 0 = empty
    mask: u64,
    match_pos: usize, // next predicted index into `buf`
    match_len: usize,
    matching: bool,
}

impl MatchModel {
    pub fn new(capacity: usize, table_bits: u32) -> Self {
        let size = 1usize << table_bits;
        Self {
            buf: Vec::with_capacity(capacity),
            table: vec![0; size],
            mask: (size - 1) as u64,
            match_pos: 0,
            match_len: 0,
            matching: false,
        }
    }

    /// The byte this model expects next, while a match is live.
    pub fn predicted_byte(&self) -> Option<u8> {
        (self.matching && self.match_pos < self.buf.len()).then(|| self.buf[self.match_pos])
    }

    pub fn match_len(&self) -> usize {
        self.match_len
    }

    pub fn push(&mut self, byte: u8) {
        if self.matching {
            if self.match_pos < self.buf.len() && self.buf[self.match_pos] == byte {
                self.match_pos += 1;
                self.match_len += 1;
            } else {
                self.matching = false;
                self.match_len = 0;
            }
        }

        self.buf.push(byte);
        let n = self.buf.len();
        if n < MATCH_ORDER {
            return;
        }

        let slot = usize!(fnv1a(&self.buf[n - MATCH_ORDER..]) & self.mask);
        if !self.matching {
            let cand = usize!(self.table[slot]);
            // a colliding slot fails the byte-for-byte check below
            if cand != 0
                && cand < n
                && self.buf[cand - MATCH_ORDER..cand] == self.buf[n - MATCH_ORDER..n]
            {
                self.match_pos = cand;
                self.match_len = MATCH_ORDER;
                self.matching = true;
            }
        }
        self.table[slot] = u32!(n); // last writer wins
    }
}

impl BytePredictor for MatchModel {
    fn predict(&mut self, probs: &mut [f32; 256]) {
        match self.predicted_byte() {
            Some(byte) => {
                let conf = (0.2 + (self.match_len as f32 - MATCH_ORDER as f32) * 0.12)
                    .clamp(0.2, 0.97);
                probs.fill((1.0 - conf) / 255.0);
                probs[usize::from(byte)] = conf;
            }
            // silent under geometric mixing
            None => probs.fill(1.0 / 256.0),
        }
    }

    fn update(&mut self, symbol: u8) {
        self.push(symbol);
    }
}
