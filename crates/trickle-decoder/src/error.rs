/// Errors from parsing a binary Netpbm header.
///
/// `Incomplete` is the only recoverable variant: it means the buffer ends
/// before the header does, and the same parse should be retried once more
/// bytes have arrived. Every other variant is permanent for the resource.
///
/// ```text
/// ┌──────────────────┬────────────────────────────────────────────────┐
/// │ Variant          │ Cause                                          │
/// ├──────────────────┼────────────────────────────────────────────────┤
/// │ Incomplete       │ Buffer ends inside the header                  │
/// │ InvalidMagic     │ First two bytes are not "P5" or "P6"           │
/// │ InvalidNumber    │ Non-digit where width/height/maxval expected   │
/// │ ZeroDimension    │ Width or height is zero                        │
/// │ UnsupportedMaxval│ Maxval is 0 or needs 16-bit samples            │
/// │ TooLarge         │ Raster would exceed MAX_RASTER_BYTES           │
/// └──────────────────┴────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("header is incomplete")]
    Incomplete,

    #[error("invalid magic: expected P5 or P6, got {found:?}")]
    InvalidMagic { found: [u8; 2] },

    #[error("invalid number in header at offset {offset}")]
    InvalidNumber { offset: usize },

    #[error("image has a zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },

    #[error("unsupported maxval {maxval}, expected 1..=255")]
    UnsupportedMaxval { maxval: u32 },

    #[error("raster of {width}x{height}x{channels} exceeds the size limit")]
    TooLarge { width: u32, height: u32, channels: u8 },
}

impl HeaderError {
    /// Whether more data could turn this into a successful parse.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}
