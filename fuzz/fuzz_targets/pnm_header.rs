#![no_main]

use libfuzzer_sys::fuzz_target;
use trickle_decoder::header::MAX_RASTER_BYTES;
use trickle_decoder::{HeaderError, PnmHeader};

// Fuzz target: PnmHeader::parse on arbitrary bytes.
//
// Catches bugs in:
// - Overflow in width/height/maxval digits
// - Comment handling running off the end of the buffer
// - Raster size overflow slipping past the allocation limit
// - Prefixes of a valid header not reporting Incomplete
fuzz_target!(|data: &[u8]| {
    let Ok(header) = PnmHeader::parse(data) else {
        return;
    };

    assert!(header.data_offset <= data.len());
    assert!(header.width > 0 && header.height > 0 && header.maxval > 0);
    let raster = header.raster_len().expect("accepted header must not overflow");
    assert!(raster <= MAX_RASTER_BYTES);

    // The header is fully determined by its first data_offset bytes.
    assert_eq!(PnmHeader::parse(&data[..header.data_offset]), Ok(header));

    // Any shorter prefix is still waiting for more data.
    for len in 0..header.data_offset {
        assert_eq!(PnmHeader::parse(&data[..len]), Err(HeaderError::Incomplete));
    }
});
