//! Zip packaging.
//!
//! Entries are held in memory until the archive is finished; there is no
//! streaming writer. Callers bound memory by bounding page counts.

use crate::error::ToolkitError;
use crate::pipeline::encode::is_image_name;
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// One named file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Bundle `entries` into a deflated zip, preserving names and order.
pub fn package_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ToolkitError> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in entries {
            zip.start_file(entry.name.as_str(), options)
                .map_err(|e| packaging(&entry.name, e))?;
            zip.write_all(&entry.bytes)
                .map_err(|e| packaging(&entry.name, e))?;
        }
        zip.finish()
            .map_err(|e| ToolkitError::Packaging(format!("finalising archive: {e}")))?;
    }
    debug!("Packaged {} entries → {} bytes", entries.len(), buf.len());
    Ok(buf)
}

fn packaging(name: &str, e: impl std::fmt::Display) -> ToolkitError {
    ToolkitError::Packaging(format!("writing entry '{name}': {e}"))
}

/// Read every file entry of a zip, in archive order. Directories are skipped.
pub fn unpack_archive(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ToolkitError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ToolkitError::Packaging(format!("opening archive: {e}")))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ToolkitError::Packaging(format!("reading entry {i}: {e}")))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(|e| ToolkitError::Packaging(format!("reading entry '{name}': {e}")))?;
        entries.push(ArchiveEntry::new(name, data));
    }
    Ok(entries)
}

/// Unpack a zip and keep only entries whose names look like images.
pub fn extract_images(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ToolkitError> {
    let images: Vec<_> = unpack_archive(bytes)?
        .into_iter()
        .filter(|e| is_image_name(&e.name))
        .collect();
    debug!("Archive holds {} image entries", images.len());
    Ok(images)
}
