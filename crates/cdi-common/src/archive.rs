//! ZIP bundles: shapefile exports going out, zipped GeoNode rasters coming in.
//!
//! Thin layer over the `zip` crate that keeps everything in memory and
//! reports failures as [`CdiError::ArchiveError`].

use crate::error::{CdiError, CdiResult};
use std::io::{Cursor, Read, Write};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const LOCAL_HEADER: [u8; 4] = *b"PK\x03\x04";

/// One file inside an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl From<ZipError> for CdiError {
    fn from(err: ZipError) -> Self {
        CdiError::ArchiveError(err.to_string())
    }
}

/// Deflate `files` (name, contents) into a new archive, in the given order.
pub fn zip_files<'a, I>(files: I) -> CdiResult<Vec<u8>>
where
    I: IntoIterator<Item = (String, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in files {
        writer.start_file(name, options)?;
        writer.write_all(data)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Whether the bytes start with a ZIP local file header.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(&LOCAL_HEADER)
}

/// Decode every file entry of an archive. Directories are skipped.
pub fn read_entries(bytes: &[u8]) -> CdiResult<Vec<ZipEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        entries.push(ZipEntry {
            name: file.name().to_string(),
            data,
        });
    }
    Ok(entries)
}

/// First entry whose lowercase name ends with one of `extensions`.
pub fn find_entry(bytes: &[u8], extensions: &[&str]) -> CdiResult<Option<ZipEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let Some(name) = archive
        .file_names()
        .find(|n| {
            let lower = n.to_ascii_lowercase();
            extensions.iter().any(|ext| lower.ends_with(ext))
        })
        .map(str::to_string)
    else {
        return Ok(None);
    };

    let mut file = archive.by_name(&name)?;
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;
    Ok(Some(ZipEntry { name, data }))
}
