/// Implementation of `trickle inspect`.
///
/// # Output format
///
/// ```text
/// Format:      P6 (pixmap, 3 channels)
/// Dimensions:  640x480
/// Maxval:      255
/// Header:      15 bytes (decoder available after byte 15)
/// Raster:      921600 bytes (1920 per row)
/// File:        921615 bytes expected, 921615 present
/// ```
use std::fs;

use anyhow::{Context, Result};
use trickle_decoder::{PnmHeader, PnmKind};

use crate::InspectArgs;

/// Run the `trickle inspect` command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not start with a
/// complete, supported Netpbm header.
pub fn run(args: &InspectArgs) -> Result<()> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;

    let header = PnmHeader::parse(&bytes)
        .with_context(|| format!("{} is not a supported netpbm file", args.file.display()))?;

    let kind = match header.kind {
        PnmKind::Graymap => "graymap",
        PnmKind::Pixmap => "pixmap",
    };
    println!(
        "Format:      {} ({kind}, {} channel{})",
        String::from_utf8_lossy(header.kind.magic()),
        header.kind.channels(),
        if header.kind.channels() == 1 { "" } else { "s" }
    );
    println!("Dimensions:  {}x{}", header.width, header.height);
    println!("Maxval:      {}", header.maxval);
    println!(
        "Header:      {} bytes (decoder available after byte {})",
        header.data_offset, header.data_offset
    );

    // parse() rejects rasters that overflow, so these are always present.
    if let (Some(raster), Some(file)) = (header.raster_len(), header.file_len()) {
        println!("Raster:      {raster} bytes ({} per row)", header.row_len());
        println!("File:        {file} bytes expected, {} present", bytes.len());
        if bytes.len() < file {
            println!("Warning:     file is truncated; final decode will fail");
        }
    }

    Ok(())
}
