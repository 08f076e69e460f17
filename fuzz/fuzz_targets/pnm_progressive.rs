#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use trickle_decoder::{Decoder, PnmDecoder, PnmHeader};

// Fuzz target: PnmDecoder fed growing prefixes of a file.
//
// Input format:
//   width, height: small dimensions for a generated P5 header
//   cuts: prefix lengths delivered progressively, in order
//   raster: raster bytes (may be shorter or longer than needed)
//
// Asserts previews only ever gain rows, match the raster bytes they
// cover, and that the final decode succeeds exactly when the raster is
// complete.
#[derive(Arbitrary, Debug)]
struct Input {
    width: u8,
    height: u8,
    cuts: Vec<u16>,
    raster: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let width = u32::from(input.width.max(1));
    let height = u32::from(input.height.max(1));
    let mut file = format!("P5 {width} {height} 255\n").into_bytes();
    let offset = file.len();
    file.extend_from_slice(&input.raster);
    let file = Bytes::from(file);

    let header = PnmHeader::parse(&file).expect("generated header is valid");
    let mut decoder = PnmDecoder::new(header);
    let row_len = header.row_len();

    let mut rows_seen = 0;
    let mut cuts: Vec<usize> = input.cuts.iter().map(|&c| usize::from(c).min(file.len())).collect();
    cuts.sort_unstable();
    for cut in cuts {
        let Some(image) = decoder.decode(&file.slice(..cut), None, false) else {
            continue;
        };
        assert!(image.rows_decoded > rows_seen);
        assert!(image.rows_decoded <= height);
        rows_seen = image.rows_decoded;
        let covered = row_len * image.rows_decoded as usize;
        assert_eq!(image.pixels[..covered], file[offset..offset + covered]);
    }

    let complete = input.raster.len() >= row_len * height as usize;
    let last = decoder.decode(&file, None, true);
    assert_eq!(last.is_some(), complete);
    if let Some(image) = last {
        assert!(image.is_complete());
    }
});
