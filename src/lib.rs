// (c) 2022 Dimitar Rusev <mitikodev@gmail.com> licensed under GPL-3.0

pub mod entropy_coders;
pub mod error;
pub mod helpers;
pub mod macros;
pub mod methods;
pub mod mixers;
pub mod models;

pub use error::{Error, Result};
pub use methods::{verify, Compressed, CompressionMethod};
