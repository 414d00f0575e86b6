pub mod bit_mixer;
pub mod byte_mixer;

pub use bit_mixer::{squash, stretch, BitMixer};
pub use byte_mixer::{ByteMixer, FREQ_TOTAL};
