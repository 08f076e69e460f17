use bytes::Bytes;
use tracing::{debug, trace};
use trickle_types::{DecodeContext, ResponseMetadata};

use crate::decoder::{Decoder, DecoderFactory};
use crate::header::PnmHeader;
use crate::image::Image;

/// Progressive decoder for binary PGM / PPM rasters.
///
/// Netpbm rasters are stored row by row with no compression, so any
/// prefix of the file decodes to a prefix of the image. Progressive calls
/// return the complete rows received so far; the final call requires the
/// whole raster.
///
/// ```text
/// ┌───────────────┬──────────────────────────────┬─────────────────────┐
/// │ Call          │ Buffer holds                 │ Result              │
/// ├───────────────┼──────────────────────────────┼─────────────────────┤
/// │ progressive   │ < 1 full row                 │ None                │
/// │ progressive   │ no new row since last call   │ None                │
/// │ progressive   │ k new full rows              │ preview, k+ rows    │
/// │ final         │ complete raster              │ full image          │
/// │ final         │ truncated raster             │ None                │
/// └───────────────┴──────────────────────────────┴─────────────────────┘
/// ```
#[derive(Debug)]
pub struct PnmDecoder {
    header: PnmHeader,
    rows_delivered: u32,
}

impl PnmDecoder {
    pub fn new(header: PnmHeader) -> Self {
        Self {
            header,
            rows_delivered: 0,
        }
    }

    pub fn header(&self) -> &PnmHeader {
        &self.header
    }

    fn build(&self, raster: &[u8], rows: u32) -> Image {
        let row_len = self.header.row_len();
        let total = row_len * self.header.height as usize;
        let filled = row_len * rows as usize;

        let mut pixels = vec![0u8; total];
        let maxval = self.header.maxval;
        for (dst, &src) in pixels[..filled].iter_mut().zip(&raster[..filled]) {
            *dst = scale(src, maxval);
        }

        Image {
            width: self.header.width,
            height: self.header.height,
            channels: self.header.kind.channels(),
            rows_decoded: rows,
            pixels,
        }
    }
}

/// Rescale a sample from `0..=maxval` to `0..=255`.
fn scale(sample: u8, maxval: u8) -> u8 {
    if maxval == u8::MAX {
        return sample;
    }
    let clamped = u16::from(sample.min(maxval));
    u8::try_from(clamped * 255 / u16::from(maxval)).unwrap_or(u8::MAX)
}

impl Decoder for PnmDecoder {
    type Output = Image;

    fn decode(
        &mut self,
        buffer: &Bytes,
        _metadata: Option<&ResponseMetadata>,
        is_final: bool,
    ) -> Option<Image> {
        let raster = buffer.get(self.header.data_offset..)?;
        let row_len = self.header.row_len();

        if is_final {
            let total = row_len * self.header.height as usize;
            if raster.len() < total {
                debug!(
                    have = raster.len(),
                    need = total,
                    "final buffer holds a truncated raster"
                );
                return None;
            }
            self.rows_delivered = self.header.height;
            return Some(self.build(raster, self.header.height));
        }

        let available = u32::try_from(raster.len() / row_len).unwrap_or(u32::MAX);
        let rows = available.min(self.header.height);
        if rows == 0 || rows <= self.rows_delivered {
            trace!(rows, delivered = self.rows_delivered, "no new rows");
            return None;
        }
        self.rows_delivered = rows;
        Some(self.build(raster, rows))
    }
}

/// Factory producing a [`PnmDecoder`] once the header has fully arrived.
///
/// Refuses (returns `None`) while the header is incomplete, and also for
/// headers that can never decode. The decode task treats both the same:
/// wait for more data, or fail if the buffer was final.
#[derive(Clone, Copy, Debug, Default)]
pub struct PnmFactory;

impl DecoderFactory for PnmFactory {
    type Decoder = PnmDecoder;

    fn make_decoder(&self, context: &DecodeContext) -> Option<PnmDecoder> {
        match PnmHeader::parse(&context.buffer) {
            Ok(header) => {
                debug!(
                    request = %context.request,
                    width = header.width,
                    height = header.height,
                    kind = ?header.kind,
                    content_type = context.content_type().unwrap_or("unknown"),
                    "recognized netpbm header"
                );
                Some(PnmDecoder::new(header))
            }
            Err(err) if err.is_incomplete() => {
                trace!(request = %context.request, len = context.buffer.len(), "header incomplete");
                None
            }
            Err(err) => {
                debug!(request = %context.request, error = %err, "unrecognized data");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trickle_types::{DecodeEvent, RequestDescriptor};

    /// 3x2 graymap, rows [1 2 3] and [4 5 6].
    const GRAY: &[u8] = b"P5 3 2 255\n\x01\x02\x03\x04\x05\x06";

    fn prefix(len: usize) -> Bytes {
        Bytes::from_static(&GRAY[..len])
    }

    fn decoder() -> PnmDecoder {
        PnmDecoder::new(PnmHeader::parse(GRAY).unwrap())
    }

    #[test]
    fn progressive_returns_complete_rows_only() {
        let mut dec = decoder();
        // Header (11 bytes) plus two samples: no full row yet.
        assert!(dec.decode(&prefix(13), None, false).is_none());

        let preview = dec.decode(&prefix(15), None, false).unwrap();
        assert_eq!(preview.rows_decoded, 1);
        assert_eq!(preview.pixels, vec![1, 2, 3, 0, 0, 0]);
        assert!(!preview.is_complete());
    }

    #[test]
    fn progressive_skips_when_no_new_rows() {
        let mut dec = decoder();
        assert!(dec.decode(&prefix(14), None, false).is_some());
        assert!(dec.decode(&prefix(16), None, false).is_none());
    }

    #[test]
    fn final_requires_full_raster() {
        let mut dec = decoder();
        assert!(dec.decode(&prefix(16), None, true).is_none());

        let image = dec.decode(&Bytes::from_static(GRAY), None, true).unwrap();
        assert!(image.is_complete());
        assert_eq!(image.pixels, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn final_after_previews_still_returns_full_image() {
        let mut dec = decoder();
        dec.decode(&Bytes::from_static(GRAY), None, false).unwrap();
        let image = dec.decode(&Bytes::from_static(GRAY), None, true).unwrap();
        assert_eq!(image.rows_decoded, 2);
    }

    #[test]
    fn samples_are_rescaled_to_eight_bits() {
        let data = Bytes::from_static(b"P5 2 1 15\n\x0f\x05");
        let mut dec = PnmDecoder::new(PnmHeader::parse(&data).unwrap());
        let image = dec.decode(&data, None, true).unwrap();
        assert_eq!(image.pixels, vec![255, 85]);
    }

    #[test]
    fn factory_waits_for_header() {
        let request = RequestDescriptor::new("mem://gray.pgm");
        let ctx = |len| DecodeContext::from_event(&request, &DecodeEvent::partial(prefix(len)));

        assert!(PnmFactory.make_decoder(&ctx(6)).is_none());
        let decoder = PnmFactory.make_decoder(&ctx(11)).expect("header complete");
        assert_eq!(decoder.header().width, 3);
    }

    #[test]
    fn factory_refuses_foreign_data() {
        let request = RequestDescriptor::new("mem://x.png");
        let ctx = DecodeContext::from_event(
            &request,
            &DecodeEvent::complete(&b"\x89PNG\r\n\x1a\n"[..]),
        );
        assert!(PnmFactory.make_decoder(&ctx).is_none());
    }
}
