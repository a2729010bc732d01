//! Batch generation from pipe-delimited lines.
//!
//! Each non-blank input line describes one image:
//!
//! ```text
//! filename | text line 1 | text line 2 | ... | overlay_name (optional)
//! ```
//!
//! The last field is an overlay selector only when it exactly matches the
//! name of a loaded overlay (e.g. `logo.png`); otherwise it is one more line
//! of text. Malformed lines are skipped with a warning and reported in
//! [`BatchOutput::skipped`]; they never abort the batch.

use crate::compose::{self, write_atomic, write_atomic_blocking};
use crate::config::ComposeConfig;
use crate::error::{ImprintError, LineError};
use crate::output::{BatchImage, BatchOutput, BatchStats, GeneratedImage};
use crate::pipeline::archive::{sanitize_file_stem, ArchiveBuilder};
use crate::pipeline::encode;
use crate::pipeline::input::{Assets, OverlaySet};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One parsed batch line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// 1-based position among non-blank lines.
    pub line: usize,
    /// File stem as typed by the user (not yet sanitised).
    pub file_name: String,
    /// Text lines joined with `\n`; may be empty.
    pub text: String,
    /// Overlay selected by the last field, if it named a loaded overlay.
    pub overlay: Option<String>,
}

/// Parse a single line. `line_no` is only used for error reporting.
pub fn parse_batch_line(
    line: &str,
    line_no: usize,
    overlays: &OverlaySet,
) -> Result<BatchEntry, LineError> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() < 2 {
        return Err(LineError::TooFewFields { line: line_no });
    }

    let file_name = parts[0].to_string();
    let last = parts[parts.len() - 1];
    let (text_parts, overlay) = if overlays.contains(last) {
        (&parts[1..parts.len() - 1], Some(last.to_string()))
    } else {
        (&parts[1..], None)
    };

    Ok(BatchEntry {
        line: line_no,
        file_name,
        text: text_parts.join("\n"),
        overlay,
    })
}

/// Parse every non-blank line of `input`.
///
/// Returns the valid entries and the errors for the lines that were skipped.
pub fn parse_batch(input: &str, overlays: &OverlaySet) -> (Vec<BatchEntry>, Vec<LineError>) {
    let mut entries = Vec::new();
    let mut errors = Vec::new();
    for (idx, line) in non_blank_lines(input).enumerate() {
        match parse_batch_line(line, idx + 1, overlays) {
            Ok(entry) => entries.push(entry),
            Err(e) => errors.push(e),
        }
    }
    (entries, errors)
}

fn non_blank_lines(input: &str) -> impl Iterator<Item = &str> {
    input.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Generate one PNG per valid line and package them into a ZIP.
///
/// # Errors
/// * [`ImprintError::EmptyBatch`] when no line produced an image
/// * [`ImprintError::MissingFont`] when lines carry text but no font is loaded
pub fn generate_batch(
    input: &str,
    assets: &Assets,
    config: &ComposeConfig,
) -> Result<BatchOutput, ImprintError> {
    let lines: Vec<&str> = non_blank_lines(input).collect();
    let total = lines.len();
    info!("Starting batch: {} line(s)", total);

    let mut collector = BatchCollector::new(total, config.progress_callback.clone());

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let entry = match parse_batch_line(line, line_no, &assets.overlays) {
            Ok(entry) => entry,
            Err(e) => {
                collector.skip(e);
                continue;
            }
        };
        debug!(
            "Line {}: '{}' ({} text line(s), overlay {:?})",
            line_no,
            entry.file_name,
            entry.text.lines().count(),
            entry.overlay
        );

        match compose::generate(assets, &entry.text, entry.overlay.as_deref(), config) {
            Ok(generated) => collector.push(line_no, &entry.file_name, entry.overlay, generated),
            Err(ImprintError::MissingFont) => return Err(ImprintError::MissingFont),
            Err(e) => collector.skip(LineError::Compose {
                line: line_no,
                detail: e.to_string(),
            }),
        }
    }

    collector.finish()
}

/// Run [`generate_batch`] and write the ZIP to `output_path`.
///
/// Generation runs in `spawn_blocking`; the archive is written atomically.
pub async fn generate_batch_to_file(
    input: &str,
    assets: &Assets,
    output_path: impl AsRef<Path>,
    config: &ComposeConfig,
) -> Result<BatchOutput, ImprintError> {
    let input = input.to_string();
    let assets = assets.clone();
    let config = config.clone();

    let output = tokio::task::spawn_blocking(move || generate_batch(&input, &assets, &config))
        .await
        .map_err(|e| ImprintError::Internal(format!("Batch task panicked: {e}")))??;

    let path = output_path.as_ref();
    write_atomic(path, &output.archive, "zip.tmp").await?;
    info!("Wrote {} ({} bytes)", path.display(), output.archive.len());
    Ok(output)
}

/// Synchronous counterpart of [`generate_batch_to_file`].
pub fn generate_batch_sync(
    input: &str,
    assets: &Assets,
    output_path: impl AsRef<Path>,
    config: &ComposeConfig,
) -> Result<BatchOutput, ImprintError> {
    let output = generate_batch(input, assets, config)?;
    write_atomic_blocking(output_path.as_ref(), &output.archive, "zip.tmp")?;
    Ok(output)
}

/// Write every image of `output` as an individual PNG into `dir`.
pub fn write_individual(output: &BatchOutput, dir: &Path) -> Result<(), ImprintError> {
    for image in &output.images {
        write_atomic_blocking(&dir.join(&image.file_name), &image.png, "png.tmp")?;
    }
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Accumulates encoded images, skipped lines and the archive for a batch.
///
/// Shared by the line batch and the county batch so both report progress,
/// deduplicate names and build stats the same way.
pub(crate) struct BatchCollector {
    start: Instant,
    total: usize,
    images: Vec<BatchImage>,
    skipped: Vec<LineError>,
    archive: ArchiveBuilder,
    progress: Option<ProgressCallback>,
}

impl BatchCollector {
    pub(crate) fn new(total: usize, progress: Option<ProgressCallback>) -> Self {
        if let Some(ref cb) = progress {
            cb.on_batch_start(total);
        }
        Self {
            start: Instant::now(),
            total,
            images: Vec::new(),
            skipped: Vec::new(),
            archive: ArchiveBuilder::new(),
            progress,
        }
    }

    pub(crate) fn skip(&mut self, error: LineError) {
        warn!("{}", error);
        if let Some(ref cb) = self.progress {
            cb.on_line_skipped(error.line(), &error.to_string());
        }
        self.skipped.push(error);
    }

    /// Encode and store one generated image as `<sanitised stem>.png`.
    pub(crate) fn push(
        &mut self,
        line: usize,
        file_stem: &str,
        overlay: Option<String>,
        generated: GeneratedImage,
    ) {
        let file_name = format!("{}.png", sanitize_file_stem(file_stem));
        let png = match encode::encode_png(&generated.image, &file_name) {
            Ok(png) => png,
            Err(e) => {
                self.skip(LineError::Compose {
                    line,
                    detail: e.to_string(),
                });
                return;
            }
        };

        if let Some(ref cb) = self.progress {
            cb.on_image_complete(line, self.total, &file_name, png.len());
        }

        self.archive.add(file_name.clone(), png.clone());
        let image = BatchImage {
            file_name,
            line,
            overlay,
            png,
            whitespace: generated.whitespace,
        };
        match self
            .images
            .iter_mut()
            .find(|i| i.file_name == image.file_name)
        {
            Some(existing) => *existing = image,
            None => self.images.push(image),
        }
    }

    pub(crate) fn finish(self) -> Result<BatchOutput, ImprintError> {
        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(self.total, self.images.len());
        }
        if self.images.is_empty() {
            return Err(ImprintError::EmptyBatch {
                total: self.total,
                skipped: self.skipped.len(),
            });
        }

        let archive = self.archive.finish()?;
        let stats = BatchStats {
            total_lines: self.total,
            generated: self.images.len(),
            skipped: self.skipped.len(),
            archive_bytes: archive.len(),
            duration_ms: self.start.elapsed().as_millis() as u64,
        };
        info!(
            "Batch complete: {} image(s), {} skipped, {}ms",
            stats.generated, stats.skipped, stats.duration_ms
        );

        Ok(BatchOutput {
            images: self.images,
            skipped: self.skipped,
            archive,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn overlays() -> OverlaySet {
        let mut set = OverlaySet::new();
        set.insert("overlay1.png", RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])));
        set.insert("overlay2.png", RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255])));
        set
    }

    #[test]
    fn parses_text_and_overlay() {
        let e = parse_batch_line("image1 | First line | Second line | overlay1.png", 1, &overlays())
            .unwrap();
        assert_eq!(e.file_name, "image1");
        assert_eq!(e.text, "First line\nSecond line");
        assert_eq!(e.overlay.as_deref(), Some("overlay1.png"));
    }

    #[test]
    fn unknown_last_field_is_text() {
        let e = parse_batch_line("image2 | Different text | star.png", 2, &overlays()).unwrap();
        assert_eq!(e.text, "Different text\nstar.png");
        assert_eq!(e.overlay, None);
    }

    #[test]
    fn two_fields_with_overlay_means_no_text() {
        let e = parse_batch_line("image3 | overlay2.png", 3, &overlays()).unwrap();
        assert_eq!(e.text, "");
        assert_eq!(e.overlay.as_deref(), Some("overlay2.png"));
    }

    #[test]
    fn single_field_is_rejected() {
        assert_eq!(
            parse_batch_line("lonely", 7, &overlays()),
            Err(LineError::TooFewFields { line: 7 })
        );
    }

    #[test]
    fn parse_batch_numbers_non_blank_lines() {
        let input = "\n a | x \n\n broken \n c | y | overlay1.png\n   \n";
        let (entries, errors) = parse_batch(input, &overlays());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, 1);
        assert_eq!(entries[1].line, 3);
        assert_eq!(errors, vec![LineError::TooFewFields { line: 2 }]);
    }

    #[test]
    fn batch_without_text_needs_no_font() {
        let assets = Assets::new(RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255])))
            .with_overlay("overlay1.png", RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])));
        let out = generate_batch("a | overlay1.png\nb | overlay1.png\nbad", &assets, &ComposeConfig::default())
            .unwrap();
        assert_eq!(out.stats.generated, 2);
        assert_eq!(out.stats.skipped, 1);
        assert_eq!(out.images[0].file_name, "a.png");
        assert_eq!(out.images[1].file_name, "b.png");
    }

    #[test]
    fn batch_with_text_and_no_font_fails_fast() {
        let assets = Assets::new(RgbaImage::new(10, 10));
        let err = generate_batch("a | hello", &assets, &ComposeConfig::default());
        assert!(matches!(err, Err(ImprintError::MissingFont)));
    }

    #[test]
    fn all_lines_skipped_is_empty_batch() {
        let assets = Assets::new(RgbaImage::new(10, 10));
        let err = generate_batch("one\ntwo", &assets, &ComposeConfig::default());
        assert!(matches!(err, Err(ImprintError::EmptyBatch { total: 2, skipped: 2 })));
    }

    #[test]
    fn duplicate_names_keep_one_entry() {
        let assets = Assets::new(RgbaImage::new(10, 10))
            .with_overlay("o.png", RgbaImage::from_pixel(2, 2, Rgba([1, 1, 1, 255])));
        let out = generate_batch("x | o.png\ny | o.png\nx | o.png", &assets, &ComposeConfig::default())
            .unwrap();
        assert_eq!(out.images.len(), 2);
        assert_eq!(out.images[0].line, 3);
    }
}
