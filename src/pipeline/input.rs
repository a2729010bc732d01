//! Input loading: templates, overlays and fonts from paths or bytes.
//!
//! Every raster is converted to RGBA8 on load so the later stages can assume
//! an alpha channel. Format detection goes by magic bytes rather than by
//! extension, so a `.png` that is really a JPEG still loads and a renamed
//! text file fails with a readable message instead of a decoder backtrace.

use crate::error::ImprintError;
use ab_glyph::FontArc;
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read a file, mapping I/O failures to the crate's input errors.
pub fn read_file(path: &Path) -> Result<Vec<u8>, ImprintError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ImprintError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ImprintError::FileNotFound {
            path: path.to_path_buf(),
        },
    })
}

/// Decode PNG or JPEG bytes into an RGBA raster.
pub fn decode_image(bytes: &[u8], name: &str) -> Result<RgbaImage, ImprintError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) | Ok(ImageFormat::Jpeg) => {}
        _ => {
            return Err(ImprintError::NotAnImage {
                name: name.to_string(),
                magic: bytes.iter().take(4).copied().collect(),
            })
        }
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| ImprintError::ImageDecode {
            name: name.to_string(),
            detail: e.to_string(),
        })?
        .to_rgba8();
    debug!("Decoded {} → {}x{} px", name, img.width(), img.height());
    Ok(img)
}

/// Load an image file as RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage, ImprintError> {
    let bytes = read_file(path)?;
    decode_image(&bytes, &display_name(path))
}

/// Parse TrueType/OpenType bytes.
pub fn decode_font(bytes: Vec<u8>, name: &str) -> Result<FontArc, ImprintError> {
    FontArc::try_from_vec(bytes).map_err(|_| ImprintError::InvalidFont {
        name: name.to_string(),
    })
}

/// Load a font file.
pub fn load_font(path: &Path) -> Result<FontArc, ImprintError> {
    let bytes = read_file(path)?;
    decode_font(bytes, &display_name(path))
}

/// File name component of `path`, used as the overlay key.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Overlays keyed by name, in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct OverlaySet {
    entries: Vec<(String, RgbaImage)>,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an overlay.
    pub fn insert(&mut self, name: impl Into<String>, image: RgbaImage) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = image,
            None => self.entries.push((name, image)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RgbaImage> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, img)| img)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an overlay, listing the loaded names when it is missing.
    pub fn require(&self, name: &str) -> Result<&RgbaImage, ImprintError> {
        self.get(name).ok_or_else(|| ImprintError::UnknownOverlay {
            name: name.to_string(),
            available: if self.is_empty() {
                "none".to_string()
            } else {
                self.names().collect::<Vec<_>>().join(", ")
            },
        })
    }
}

/// Everything loaded once per invocation: template, optional font, overlays.
#[derive(Clone)]
pub struct Assets {
    pub template: RgbaImage,
    pub font: Option<FontArc>,
    pub overlays: OverlaySet,
}

impl std::fmt::Debug for Assets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assets")
            .field("template", &self.template.dimensions())
            .field("font", &self.font.as_ref().map(|_| "<font>"))
            .field("overlays", &self.overlays.names().collect::<Vec<_>>())
            .finish()
    }
}

impl Assets {
    pub fn new(template: RgbaImage) -> Self {
        Self {
            template,
            font: None,
            overlays: OverlaySet::new(),
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_overlay(mut self, name: impl Into<String>, image: RgbaImage) -> Self {
        self.overlays.insert(name, image);
        self
    }

    /// Load the template, optional font and overlays from disk.
    ///
    /// Overlays are keyed by their file name (`logo.png`), which is what
    /// batch lines refer to.
    pub fn load(
        template: &Path,
        font: Option<&Path>,
        overlays: &[PathBuf],
    ) -> Result<Self, ImprintError> {
        let mut assets = Assets::new(load_image(template)?);
        if let Some(font) = font {
            assets.font = Some(load_font(font)?);
        }
        for path in overlays {
            assets.overlays.insert(display_name(path), load_image(path)?);
        }

        info!(
            "Loaded template ({}x{}), {}, {} overlay image(s)",
            assets.template.width(),
            assets.template.height(),
            if assets.font.is_some() { "font" } else { "no font" },
            assets.overlays.len()
        );
        Ok(assets)
    }
}
