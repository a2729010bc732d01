//! Multi-line text rendering onto an RGBA canvas.
//!
//! `style.font_size` is the em size in pixels, as in most image editors and
//! TrueType APIs. The block's top-left corner sits at `(style.x, style.y)`
//! (the first line's ascender). Each line advances by the scaled ascent
//! plus `style.line_spacing` and is aligned within the width of the widest
//! line.

use crate::config::{TextAlign, TextStyle};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::RgbaImage;
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::debug;

/// Width and height in pixels of `text` laid out with `style`.
pub fn measure_text_block(text: &str, font: &FontArc, style: &TextStyle) -> (u32, u32) {
    let scale = em_scale(font, style.font_size);
    let widths = line_widths(text, font, scale);
    if widths.is_empty() {
        return (0, 0);
    }
    let advance = line_advance(font, scale, style.line_spacing);
    let scaled = font.as_scaled(scale);
    let line_height = (scaled.ascent() - scaled.descent()).ceil() as u32;
    let height = advance * (widths.len() as u32 - 1) + line_height;
    (widths.iter().copied().max().unwrap_or(0), height)
}

/// Draw `text` onto `canvas`. Empty text draws nothing.
pub fn draw_text_block(canvas: &mut RgbaImage, text: &str, font: &FontArc, style: &TextStyle) {
    if text.is_empty() {
        return;
    }

    let scale = em_scale(font, style.font_size);
    let color = style.color.to_rgba(255);
    let widths = line_widths(text, font, scale);
    let block_width = widths.iter().copied().max().unwrap_or(0);
    let advance = line_advance(font, scale, style.line_spacing) as i32;

    for (i, (line, width)) in text.split('\n').zip(widths).enumerate() {
        let line = line.trim_end_matches('\r');
        let dx = match style.align {
            TextAlign::Left => 0,
            TextAlign::Center => (block_width - width) as i32 / 2,
            TextAlign::Right => (block_width - width) as i32,
        };
        let y = style.y + advance * i as i32;
        if !line.is_empty() {
            draw_text_mut(canvas, color, style.x + dx, y, scale, font, line);
        }
    }

    debug!(
        "Drew {} text line(s) at ({}, {}), block width {}px",
        text.split('\n').count(),
        style.x,
        style.y,
        block_width
    );
}

/// Scale at which one em of `font` spans `size_px` pixels.
///
/// `PxScale` measures ascent to descent, which is taller than the em box for
/// most fonts, so the requested size is stretched by `height / units_per_em`.
pub fn em_scale(font: &FontArc, size_px: f32) -> PxScale {
    let height = font.height_unscaled();
    let units_per_em = font.units_per_em().unwrap_or(height);
    if height <= 0.0 || units_per_em <= 0.0 {
        return PxScale::from(size_px);
    }
    PxScale::from(size_px * height / units_per_em)
}

fn line_widths(text: &str, font: &FontArc, scale: PxScale) -> Vec<u32> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                0
            } else {
                text_size(scale, font, line).0
            }
        })
        .collect()
}

fn line_advance(font: &FontArc, scale: PxScale, spacing: u32) -> u32 {
    font.as_scaled(scale).ascent().ceil() as u32 + spacing
}
