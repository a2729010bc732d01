//! Result types returned by the generation entry points.

use crate::error::LineError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// One composed image, still in memory.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: RgbaImage,
    /// Present when [`crate::ComposeConfig::analyze_whitespace`] is set and an
    /// overlay was composited.
    pub whitespace: Option<WhitespaceReport>,
}

/// Diagnostics about how an overlay filled its box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhitespaceReport {
    /// Percentage of near-white or transparent pixels inside the overlay box
    /// on the composed canvas.
    pub whitespace_pct: f64,
    pub original_size: (u32, u32),
    /// Size after trimming; equals `original_size` when trimming is off.
    pub trimmed_size: (u32, u32),
    /// Size actually pasted after fitting.
    pub final_size: (u32, u32),
}

/// One archive entry produced by a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchImage {
    /// Archive entry name, e.g. `image1.png`.
    pub file_name: String,
    /// 1-based input line (or county index) this entry came from.
    pub line: usize,
    /// Overlay that was composited, if any.
    pub overlay: Option<String>,
    #[serde(skip)]
    pub png: Vec<u8>,
    pub whitespace: Option<WhitespaceReport>,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Generated entries in archive order, one per distinct file name.
    pub images: Vec<BatchImage>,
    /// Lines that were skipped, with the reason.
    pub skipped: Vec<LineError>,
    /// The ZIP archive holding every PNG in `images`.
    #[serde(skip)]
    pub archive: Vec<u8>,
    pub stats: BatchStats,
}

/// Counters and timings for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Non-blank input lines (or counties) considered.
    pub total_lines: usize,
    pub generated: usize,
    pub skipped: usize,
    pub archive_bytes: usize,
    pub duration_ms: u64,
}
