use serde::Serialize;

/// A decoded raster, possibly a progressive preview.
///
/// `pixels` always has room for the whole image (`width * height *
/// channels` bytes, row-major). In a preview only the first
/// `rows_decoded` rows carry data; the rest are zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub rows_decoded: u32,
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

impl Image {
    /// Whether every row has been decoded.
    pub fn is_complete(&self) -> bool {
        self.rows_decoded == self.height
    }

    /// Bytes of row `index`, or `None` if out of range.
    pub fn row(&self, index: u32) -> Option<&[u8]> {
        if index >= self.height {
            return None;
        }
        let row_len = self.width as usize * usize::from(self.channels);
        let start = index as usize * row_len;
        self.pixels.get(start..start + row_len)
    }
}
