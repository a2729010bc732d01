//! Error types for the imprint library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ImprintError`] — **Fatal**: nothing can be generated at all (missing
//!   template, unreadable font, broken shapefile archive). Returned as
//!   `Err(ImprintError)` from the top-level `generate*` functions.
//!
//! * [`LineError`] — **Non-fatal**: a single batch line was malformed or
//!   could not be composed, but every other line is fine. Stored inside
//!   [`crate::output::BatchOutput`] so callers can show the warnings next
//!   to the archive instead of losing the whole batch to one typo.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the imprint library.
///
/// Per-line batch failures use [`LineError`] and are stored in
/// [`crate::output::BatchOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ImprintError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is neither PNG nor JPEG.
    #[error("'{name}' is not a PNG or JPEG image\nFirst bytes: {magic:?}")]
    NotAnImage { name: String, magic: Vec<u8> },

    /// The file looked like an image but the decoder rejected it.
    #[error("Failed to decode image '{name}': {detail}")]
    ImageDecode { name: String, detail: String },

    /// The font file could not be parsed as TrueType/OpenType.
    #[error("Font '{name}' is not a valid TrueType/OpenType font")]
    InvalidFont { name: String },

    /// Text was requested but no font was loaded.
    #[error("Text was given but no font is loaded.\nProvide one with --font <FILE.ttf>.")]
    MissingFont,

    /// An overlay was selected by name but no such overlay was loaded.
    #[error("Unknown overlay '{name}' (loaded: {available})")]
    UnknownOverlay { name: String, available: String },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// No line of the batch input produced an image.
    #[error("Batch produced no images: {total} non-blank lines, {skipped} skipped")]
    EmptyBatch { total: usize, skipped: usize },

    // ── County map errors ─────────────────────────────────────────────────
    /// The shapefile archive could not be read.
    #[error("Could not read shapefile archive: {detail}")]
    ShapefileRead { detail: String },

    /// The shapefile contains no county for the requested state.
    #[error("No counties found for state '{state}' (field '{field}')")]
    NoCountiesFound { state: String, field: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// A color string is not `#RRGGBB`.
    #[error("Invalid color '{value}': expected #RRGGBB")]
    InvalidColor { value: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// PNG encoding failed.
    #[error("Failed to encode '{name}' as PNG: {detail}")]
    Encode { name: String, detail: String },

    /// Writing the ZIP archive failed.
    #[error("Failed to build archive: {0}")]
    Archive(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single batch line.
///
/// Line numbers are 1-based and count non-blank lines only, matching what
/// the user sees in their input list.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum LineError {
    /// The line has fewer than two `|`-separated fields.
    #[error("Skipping line {line}: needs at least filename and one text part")]
    TooFewFields { line: usize },

    /// The line parsed but composing or encoding its image failed.
    #[error("Line {line}: {detail}")]
    Compose { line: usize, detail: String },
}

impl LineError {
    /// 1-based line number this error refers to.
    pub fn line(&self) -> usize {
        match self {
            LineError::TooFewFields { line } | LineError::Compose { line, .. } => *line,
        }
    }
}
