//! Single-image composition entry points.
//!
//! [`compose`] is the core: template copy → overlay preparation → alpha
//! composite → text. [`generate`] resolves an overlay by name from loaded
//! [`Assets`]; [`generate_to_file`] runs the work on a blocking thread and
//! writes the PNG atomically.

use crate::config::ComposeConfig;
use crate::error::ImprintError;
use crate::output::{GeneratedImage, WhitespaceReport};
use crate::pipeline::input::Assets;
use crate::pipeline::{encode, text, transform};
use ab_glyph::FontArc;
use image::imageops;
use image::RgbaImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Compose one image.
///
/// # Arguments
/// * `template` — background raster; copied, never modified
/// * `overlay`  — optional raster pasted into the configured overlay box
/// * `text`     — optional multi-line text; `None` or `""` draws nothing
/// * `font`     — required whenever `text` is non-empty
/// * `config`   — layout
///
/// # Errors
/// [`ImprintError::MissingFont`] when text is given without a font.
pub fn compose(
    template: &RgbaImage,
    overlay: Option<&RgbaImage>,
    text: Option<&str>,
    font: Option<&FontArc>,
    config: &ComposeConfig,
) -> Result<GeneratedImage, ImprintError> {
    let text = text.filter(|t| !t.is_empty());
    let font = match (text, font) {
        (Some(_), None) => return Err(ImprintError::MissingFont),
        (_, f) => f,
    };

    let mut canvas = template.clone();
    let mut whitespace = None;

    if let Some(overlay) = overlay {
        let placement = config.overlay;
        let prepared = prepare_overlay(overlay, config);

        let (paste_x, paste_y) = if config.center_overlay {
            let (dx, dy) =
                transform::center_in_box(&prepared.image, placement.max_width, placement.max_height);
            (placement.x + dx, placement.y + dy)
        } else {
            (placement.x, placement.y)
        };

        imageops::overlay(&mut canvas, &prepared.image, paste_x, paste_y);
        debug!(
            "Overlay {}x{} pasted at ({}, {})",
            prepared.image.width(),
            prepared.image.height(),
            paste_x,
            paste_y
        );

        if config.analyze_whitespace {
            whitespace = Some(WhitespaceReport {
                whitespace_pct: transform::whitespace_ratio(
                    &canvas,
                    placement.x,
                    placement.y,
                    placement.max_width,
                    placement.max_height,
                ),
                original_size: overlay.dimensions(),
                trimmed_size: prepared.trimmed_size,
                final_size: prepared.image.dimensions(),
            });
        }
    }

    if let (Some(text), Some(font)) = (text, font) {
        text::draw_text_block(&mut canvas, text, font, &config.text);
    }

    Ok(GeneratedImage {
        image: canvas,
        whitespace,
    })
}

/// An overlay after color-keying, trimming and fitting.
#[derive(Debug, Clone)]
pub struct PreparedOverlay {
    pub image: RgbaImage,
    /// Size after the trim step (the input size when trimming is off).
    pub trimmed_size: (u32, u32),
}

/// Apply the configured overlay transforms in order: color key, trim, fit.
pub fn prepare_overlay(overlay: &RgbaImage, config: &ComposeConfig) -> PreparedOverlay {
    let keyed = match &config.color_key {
        Some(key) => transform::remove_color(overlay, key.color.rgb(), key.threshold),
        None => overlay.clone(),
    };
    let trimmed = if config.trim_whitespace {
        transform::trim_transparent_border(&keyed)
    } else {
        keyed
    };
    let fitted = transform::fit_into_box(
        &trimmed,
        config.overlay.max_width,
        config.overlay.max_height,
    );
    PreparedOverlay {
        trimmed_size: trimmed.dimensions(),
        image: fitted,
    }
}

/// Compose `text` and the overlay called `overlay_name` onto the loaded template.
pub fn generate(
    assets: &Assets,
    text: &str,
    overlay_name: Option<&str>,
    config: &ComposeConfig,
) -> Result<GeneratedImage, ImprintError> {
    let overlay = overlay_name
        .map(|name| assets.overlays.require(name))
        .transpose()?;
    compose(
        &assets.template,
        overlay,
        Some(text),
        assets.font.as_ref(),
        config,
    )
}

/// [`generate`] and encode the result as PNG.
pub fn generate_png(
    assets: &Assets,
    text: &str,
    overlay_name: Option<&str>,
    config: &ComposeConfig,
) -> Result<(Vec<u8>, Option<WhitespaceReport>), ImprintError> {
    let generated = generate(assets, text, overlay_name, config)?;
    let png = encode::encode_png(&generated.image, "generated_image.png")?;
    Ok((png, generated.whitespace))
}

/// Generate one image and write it to `output_path` as PNG.
///
/// The raster work runs in `spawn_blocking`; the file is written to a
/// temporary sibling first and renamed into place, so readers never see a
/// half-written PNG.
pub async fn generate_to_file(
    assets: &Assets,
    text: &str,
    overlay_name: Option<&str>,
    output_path: impl AsRef<Path>,
    config: &ComposeConfig,
) -> Result<Option<WhitespaceReport>, ImprintError> {
    let start = Instant::now();
    let assets = assets.clone();
    let text = text.to_string();
    let overlay_name = overlay_name.map(str::to_string);
    let config = config.clone();

    let (png, report) = tokio::task::spawn_blocking(move || {
        generate_png(&assets, &text, overlay_name.as_deref(), &config)
    })
    .await
    .map_err(|e| ImprintError::Internal(format!("Compose task panicked: {e}")))??;

    let path = output_path.as_ref();
    write_atomic(path, &png, "png.tmp").await?;
    info!(
        "Wrote {} ({} bytes) in {}ms",
        path.display(),
        png.len(),
        start.elapsed().as_millis()
    );
    Ok(report)
}

/// Synchronous counterpart of [`generate_to_file`].
pub fn generate_to_file_sync(
    assets: &Assets,
    text: &str,
    overlay_name: Option<&str>,
    output_path: impl AsRef<Path>,
    config: &ComposeConfig,
) -> Result<Option<WhitespaceReport>, ImprintError> {
    let (png, report) = generate_png(assets, text, overlay_name, config)?;
    write_atomic_blocking(output_path.as_ref(), &png, "png.tmp")?;
    Ok(report)
}

/// Write already-encoded PNG bytes to `path` the way [`generate_to_file`]
/// does: parent directories are created and the file appears atomically.
pub async fn write_png(path: impl AsRef<Path>, png: &[u8]) -> Result<(), ImprintError> {
    write_atomic(path.as_ref(), png, "png.tmp").await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Atomic write: create parent dirs, write `<path>.<tmp_ext>`, rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8], tmp_ext: &str) -> Result<(), ImprintError> {
    let write_err = |source: std::io::Error| ImprintError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension(tmp_ext);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Blocking twin of [`write_atomic`] for the `_sync` entry points.
pub(crate) fn write_atomic_blocking(path: &Path, bytes: &[u8], tmp_ext: &str) -> Result<(), ImprintError> {
    let write_err = |source: std::io::Error| ImprintError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let tmp_path = path.with_extension(tmp_ext);
    std::fs::write(&tmp_path, bytes).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)?;
    Ok(())
}
