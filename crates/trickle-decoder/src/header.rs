use crate::error::HeaderError;

/// Largest raster the decoder will allocate for, in bytes.
///
/// Guards against headers that announce absurd dimensions: the decoder
/// allocates the full raster up front for progressive previews.
pub const MAX_RASTER_BYTES: usize = 256 * 1024 * 1024;

/// Binary Netpbm flavours the decoder understands.
///
/// ```text
/// ┌───────┬──────────┬──────────┬───────────────────────────┐
/// │ Magic │ Kind     │ Channels │ Sample layout             │
/// ├───────┼──────────┼──────────┼───────────────────────────┤
/// │ P5    │ Graymap  │ 1        │ one byte per pixel        │
/// │ P6    │ Pixmap   │ 3        │ R, G, B bytes per pixel   │
/// └───────┴──────────┴──────────┴───────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PnmKind {
    Graymap,
    Pixmap,
}

impl PnmKind {
    pub fn channels(self) -> u8 {
        match self {
            Self::Graymap => 1,
            Self::Pixmap => 3,
        }
    }

    pub fn magic(self) -> &'static [u8; 2] {
        match self {
            Self::Graymap => b"P5",
            Self::Pixmap => b"P6",
        }
    }

    fn from_magic(magic: [u8; 2]) -> Option<Self> {
        match &magic {
            b"P5" => Some(Self::Graymap),
            b"P6" => Some(Self::Pixmap),
            _ => None,
        }
    }
}

/// Parsed binary Netpbm header.
///
/// ```text
/// ┌────┬────┬───────┬────┬────────┬────┬────────┬─────┬──────────┐
/// │ P5 │ ws │ width │ ws │ height │ ws │ maxval │ ws₁ │ raster … │
/// └────┴────┴───────┴────┴────────┴────┴────────┴─────┴──────────┘
///                                                      ▲
///                                               data_offset
/// ```
///
/// Whitespace between tokens may contain `#` comments running to the end
/// of the line. Exactly one whitespace byte separates `maxval` from the
/// raster; the raster starts at `data_offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PnmHeader {
    pub kind: PnmKind,
    pub width: u32,
    pub height: u32,
    pub maxval: u8,
    pub data_offset: usize,
}

impl PnmHeader {
    /// Parse a header from the start of `buf`.
    ///
    /// `buf` may hold any prefix of the file. If it ends before the
    /// header is complete the result is [`HeaderError::Incomplete`] and
    /// the parse should be retried with a longer prefix.
    ///
    /// # Errors
    ///
    /// - [`HeaderError::Incomplete`] if `buf` ends inside the header.
    /// - [`HeaderError::InvalidMagic`] for anything but `P5` / `P6`.
    /// - [`HeaderError::InvalidNumber`] if a numeric field is malformed.
    /// - [`HeaderError::ZeroDimension`], [`HeaderError::UnsupportedMaxval`]
    ///   and [`HeaderError::TooLarge`] for values the decoder refuses.
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        // A partial magic can still turn out valid.
        if buf.len() < 2 {
            return match buf.first() {
                None | Some(b'P') => Err(HeaderError::Incomplete),
                Some(&b) => Err(HeaderError::InvalidMagic { found: [b, 0] }),
            };
        }
        let magic = [buf[0], buf[1]];
        let kind = PnmKind::from_magic(magic).ok_or(HeaderError::InvalidMagic { found: magic })?;

        let mut cursor = Cursor { buf, pos: 2 };
        let width = cursor.number()?;
        let height = cursor.number()?;
        let maxval = cursor.number()?;

        // Single whitespace byte before the raster.
        match buf.get(cursor.pos) {
            None => return Err(HeaderError::Incomplete),
            Some(b) if b.is_ascii_whitespace() => cursor.pos += 1,
            Some(_) => return Err(HeaderError::InvalidNumber { offset: cursor.pos }),
        }

        if width == 0 || height == 0 {
            return Err(HeaderError::ZeroDimension { width, height });
        }
        let maxval = match u8::try_from(maxval) {
            Ok(v) if v > 0 => v,
            _ => return Err(HeaderError::UnsupportedMaxval { maxval }),
        };

        let header = Self {
            kind,
            width,
            height,
            maxval,
            data_offset: cursor.pos,
        };
        if header.raster_len().is_none_or(|len| len > MAX_RASTER_BYTES) {
            return Err(HeaderError::TooLarge {
                width,
                height,
                channels: kind.channels(),
            });
        }
        Ok(header)
    }

    /// Bytes per raster row.
    pub fn row_len(&self) -> usize {
        self.width as usize * usize::from(self.kind.channels())
    }

    /// Total raster size, or `None` on overflow.
    pub fn raster_len(&self) -> Option<usize> {
        self.row_len().checked_mul(self.height as usize)
    }

    /// Size of the complete file this header describes.
    pub fn file_len(&self) -> Option<usize> {
        self.raster_len()?.checked_add(self.data_offset)
    }
}

/// Token reader over the header bytes.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    /// Skip whitespace and comments, then read one decimal number.
    ///
    /// A number touching the end of the buffer is `Incomplete`: more
    /// digits may still follow.
    fn number(&mut self) -> Result<u32, HeaderError> {
        self.skip_separators()?;

        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(&b) = self.buf.get(self.pos) {
            if !b.is_ascii_digit() {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(b - b'0')))
                .ok_or(HeaderError::InvalidNumber { offset: start })?;
            self.pos += 1;
        }

        if self.pos == self.buf.len() {
            return Err(HeaderError::Incomplete);
        }
        if self.pos == start {
            return Err(HeaderError::InvalidNumber { offset: start });
        }
        Ok(value)
    }

    fn skip_separators(&mut self) -> Result<(), HeaderError> {
        let mut skipped = false;
        loop {
            match self.buf.get(self.pos) {
                None => return Err(HeaderError::Incomplete),
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                    skipped = true;
                }
                Some(b'#') => {
                    // Comment runs to end of line.
                    while let Some(&b) = self.buf.get(self.pos) {
                        self.pos += 1;
                        if b == b'\n' || b == b'\r' {
                            break;
                        }
                    }
                    skipped = true;
                }
                Some(_) if skipped => return Ok(()),
                Some(_) => return Err(HeaderError::InvalidNumber { offset: self.pos }),
            }
        }
    }
}
