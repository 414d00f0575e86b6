use super::{add_soft_component, fnv1a_pair, fnv1a_step, BytePredictor, PredictionTable, FNV_OFFSET};

/// Soft predictor over word contexts: what byte tends to follow the
/// current partial word, and the current word given the previous one.
/// Deliberately shallow peaks, so geometric mixing treats it as a
/// nudge rather than a veto.
pub struct WordModel {
    unigram: PredictionTable,
    bigram: PredictionTable,
    word: u64, // rolling hash of the partial word; 0 = between words
    prev_word: u64,
}

impl WordModel {
    pub fn new(table_bits: u32) -> Self {
        Self {
            unigram: PredictionTable::new(table_bits),
            bigram: PredictionTable::new(table_bits),
            word: 0,
            prev_word: 0,
        }
    }

    fn bigram_hash(&self) -> u64 {
        if self.word == 0 || self.prev_word == 0 {
            0
        } else {
            fnv1a_pair(self.prev_word, self.word)
        }
    }
}

impl BytePredictor for WordModel {
    fn predict(&mut self, probs: &mut [f32; 256]) {
        probs.fill(0.0);
        let unigram = (self.word != 0)
            .then(|| self.unigram.boost(self.word))
            .flatten();
        let bigram = {
            let hash = self.bigram_hash();
            (hash != 0).then(|| self.bigram.boost(hash)).flatten()
        };
        add_soft_component(probs, unigram, 0.5);
        add_soft_component(probs, bigram, 0.5);
    }

    fn update(&mut self, symbol: u8) {
        if self.word != 0 {
            self.unigram.observe(self.word, symbol);
        }
        let bigram = self.bigram_hash();
        if bigram != 0 {
            self.bigram.observe(bigram, symbol);
        }

        if symbol.is_ascii_alphabetic() {
            let h = if self.word == 0 { FNV_OFFSET } else { self.word };
            self.word = fnv1a_step(h, symbol.to_ascii_lowercase());
        } else {
            if self.word != 0 {
                self.prev_word = self.word;
            }
            self.word = 0;
        }
    }
}
