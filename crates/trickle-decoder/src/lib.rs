#![warn(clippy::pedantic)]

pub mod decoder;
pub mod error;
pub mod header;
pub mod image;
pub mod pnm;

pub use decoder::{Decoder, DecoderFactory, FnFactory};
pub use error::HeaderError;
pub use header::{PnmHeader, PnmKind};
pub use image::Image;
pub use pnm::{PnmDecoder, PnmFactory};
