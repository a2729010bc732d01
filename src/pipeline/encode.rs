//! Image encoding: `RgbaImage` → PNG bytes, optionally base64 data-URI.
//!
//! PNG keeps the alpha channel and crisp text edges; every output of this
//! crate is PNG. The data-URI form is what `--json` output embeds so a web
//! front end can show a preview without a second request.

use crate::error::ImprintError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Encode `img` as PNG. `name` is only used in error messages.
pub fn encode_png(img: &RgbaImage, name: &str) -> Result<Vec<u8>, ImprintError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ImprintError::Encode {
            name: name.to_string(),
            detail: e.to_string(),
        })?;

    debug!(
        "Encoded {} ({}x{}) → {} bytes PNG",
        name,
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Wrap already-encoded PNG bytes in a `data:image/png;base64,` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
