//! ZIP packaging of generated PNGs.
//!
//! Entries are collected in memory and written in one go by
//! [`ArchiveBuilder::finish`]. Adding a name twice replaces the earlier bytes
//! but keeps its position, so the archive lists files in input order with
//! one entry per distinct name.

use crate::error::ImprintError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// In-memory ZIP archive under construction.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => {
                warn!("Duplicate archive entry '{}': keeping the later image", name);
                existing.1 = bytes;
            }
            None => self.entries.push((name, bytes)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Write every entry with DEFLATE compression and return the archive bytes.
    pub fn finish(&self) -> Result<Vec<u8>, ImprintError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options)
                .map_err(|e| ImprintError::Archive(format!("{name}: {e}")))?;
            zip.write_all(bytes)
                .map_err(|e| ImprintError::Archive(format!("{name}: {e}")))?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| ImprintError::Archive(e.to_string()))?;
        let bytes = cursor.into_inner();
        debug!("Archive: {} entries, {} bytes", self.entries.len(), bytes.len());
        Ok(bytes)
    }
}

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1F\x7F]"#).expect("valid regex"));

/// Make a user-supplied name safe to use as an archive entry or file stem.
///
/// Path separators, reserved characters and control characters become `_`;
/// leading/trailing dots and spaces are dropped so `..` cannot climb out of
/// the extraction directory. An empty result falls back to `image`.
pub fn sanitize_file_stem(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name.trim(), "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}
