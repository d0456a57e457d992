//! Archive Packager: successful payloads → one zip byte stream.

use crate::asset::{Asset, Payload};
use crate::error::ExtractError;
use std::io::{Cursor, Write};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack `entries` into a zip archive, one entry per asset named by its
/// filename, in the order given.
///
/// Callers pass entries in ordinal order; failed assets are simply absent.
/// An empty slice is the run-level `archive-empty` failure, reported with
/// `attempted` as the number of assets that were tried.
pub fn pack_archive(
    entries: &[(&Asset, &Payload)],
    attempted: usize,
) -> Result<Vec<u8>, ExtractError> {
    if entries.is_empty() {
        return Err(ExtractError::ArchiveEmpty { attempted });
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (asset, payload) in entries {
        zip.start_file(asset.filename.as_str(), options)
            .map_err(|e| ExtractError::ArchiveWriteFailed(format!("{}: {e}", asset.filename)))?;
        zip.write_all(&payload.bytes)
            .map_err(|e| ExtractError::ArchiveWriteFailed(format!("{}: {e}", asset.filename)))?;
        debug!("Archived {} ({} bytes)", asset.filename, payload.len());
    }

    let bytes = zip
        .finish()
        .map_err(|e| ExtractError::ArchiveWriteFailed(e.to_string()))?
        .into_inner();

    info!("Archive: {} entries, {} bytes", entries.len(), bytes.len());
    Ok(bytes)
}
