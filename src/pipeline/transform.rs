//! Pure raster transforms applied to overlays before compositing.
//!
//! Every function takes the input by reference and returns a new image or a
//! value; nothing here touches the file system or logs above `debug`.

use image::imageops::{self, FilterType};
use image::{GenericImageView, RgbaImage};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scale `image` so it fits inside `max_w × max_h`, preserving aspect ratio.
///
/// The smaller of the two axis scale factors wins, so the image may grow as
/// well as shrink. Resulting dimensions are floored and never exceed the
/// bounds. A zero-sized input is returned as is.
pub fn fit_into_box(image: &RgbaImage, max_w: u32, max_h: u32) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }

    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    // The epsilon keeps exact fits like 3 × (1/3) from flooring to 0.
    let new_w = ((w as f64 * scale + 1e-9).floor() as u32).min(max_w);
    let new_h = ((h as f64 * scale + 1e-9).floor() as u32).min(max_h);

    if new_w == 0 || new_h == 0 {
        return RgbaImage::new(new_w, new_h);
    }
    if (new_w, new_h) == (w, h) {
        return image.clone();
    }
    imageops::resize(image, new_w, new_h, FilterType::Lanczos3)
}

/// Bounding box of all pixels with non-zero alpha, or `None` if the image is
/// fully transparent (or empty).
pub fn transparent_bounds(image: &RgbaImage) -> Option<PixelRect> {
    let (w, h) = image.dimensions();
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;

    for (y, row) in image.rows().enumerate() {
        for (x, px) in row.enumerate() {
            if px.0[3] != 0 {
                let (x, y) = (x as u32, y as u32);
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
                found = true;
            }
        }
    }

    if !found || w == 0 || h == 0 {
        return None;
    }
    Some(PixelRect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Crop `image` to the bounding box of its non-transparent pixels.
///
/// A fully transparent image is returned unchanged.
pub fn trim_transparent_border(image: &RgbaImage) -> RgbaImage {
    match transparent_bounds(image) {
        Some(r) => imageops::crop_imm(image, r.x, r.y, r.width, r.height).to_image(),
        None => image.clone(),
    }
}

/// Offsets that center `image` inside a `box_w × box_h` box.
///
/// Uses floor division, so an image larger than the box gets negative
/// offsets.
pub fn center_in_box(image: &RgbaImage, box_w: u32, box_h: u32) -> (i64, i64) {
    let (w, h) = image.dimensions();
    let dx = (box_w as i64 - w as i64).div_euclid(2);
    let dy = (box_h as i64 - h as i64).div_euclid(2);
    (dx, dy)
}

/// Make every pixel whose RGB lies closer than `threshold` (Euclidean) to
/// `target` fully transparent. Other pixels pass through untouched.
///
/// Runs as one pass over the raw sample buffer comparing squared distances,
/// so a 2000×2000 logo costs a few milliseconds.
pub fn remove_color(image: &RgbaImage, target: [u8; 3], threshold: f32) -> RgbaImage {
    let mut out = image.clone();
    if !(threshold > 0.0) {
        return out;
    }

    let limit = threshold as f64 * threshold as f64;
    let [tr, tg, tb] = target.map(i32::from);
    for px in out.chunks_exact_mut(4) {
        let dr = px[0] as i32 - tr;
        let dg = px[1] as i32 - tg;
        let db = px[2] as i32 - tb;
        let dist2 = (dr * dr + dg * dg + db * db) as f64;
        if dist2 < limit {
            px[3] = 0;
        }
    }
    out
}

/// Percentage (0–100) of "empty" pixels inside a region of `image`.
///
/// A pixel counts as empty when it is nearly transparent (alpha < 10) or
/// nearly white (all channels > 240). The region is clamped to the image;
/// an empty intersection yields 0.
pub fn whitespace_ratio(image: &RgbaImage, x: i64, y: i64, width: u32, height: u32) -> f64 {
    let (img_w, img_h) = image.dimensions();
    let x = x.clamp(0, img_w as i64) as u32;
    let y = y.clamp(0, img_h as i64) as u32;
    let w = width.min(img_w - x);
    let h = height.min(img_h - y);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let region = imageops::crop_imm(image, x, y, w, h);
    let empty = region
        .pixels()
        .filter(|(_, _, px)| {
            let [r, g, b, a] = px.0;
            a < 10 || (r > 240 && g > 240 && b > 240)
        })
        .count();

    empty as f64 / (w as f64 * h as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    /// A 10×8 transparent canvas with an opaque 3×2 block at (4,5).
    fn padded_block() -> RgbaImage {
        let mut img = solid(10, 8, [0, 0, 0, 0]);
        for y in 5..7 {
            for x in 4..7 {
                img.put_pixel(x, y, Rgba([200, 10, 10, 255]));
            }
        }
        img
    }

    #[test]
    fn fit_never_exceeds_bounds() {
        let cases = [(400, 100), (100, 400), (7, 3), (1, 1), (225, 175), (1000, 999)];
        for (w, h) in cases {
            let out = fit_into_box(&solid(w, h, [1, 2, 3, 255]), 225, 175);
            assert!(out.width() <= 225 && out.height() <= 175, "{w}x{h} → {:?}", out.dimensions());
        }
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        let out = fit_into_box(&solid(400, 100, [0, 0, 0, 255]), 225, 175);
        assert_eq!(out.dimensions(), (225, 56));

        let out = fit_into_box(&solid(100, 400, [0, 0, 0, 255]), 225, 175);
        assert_eq!(out.dimensions(), (43, 175));

        let src = (333u32, 127u32);
        let out = fit_into_box(&solid(src.0, src.1, [0, 0, 0, 255]), 200, 200);
        let expected_h = src.1 as f64 * out.width() as f64 / src.0 as f64;
        assert!((out.height() as f64 - expected_h).abs() <= 1.0);
    }

    #[test]
    fn fit_scales_up_small_images() {
        let out = fit_into_box(&solid(10, 5, [0, 0, 0, 255]), 100, 100);
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn fit_handles_zero_sizes() {
        let empty = RgbaImage::new(0, 0);
        assert_eq!(fit_into_box(&empty, 10, 10).dimensions(), (0, 0));
        let out = fit_into_box(&solid(10, 10, [0, 0, 0, 255]), 0, 10);
        assert_eq!(out.dimensions(), (0, 0));
    }

    #[test]
    fn trim_crops_to_opaque_block() {
        let out = trim_transparent_border(&padded_block());
        assert_eq!(out.dimensions(), (3, 2));
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn trim_is_idempotent() {
        let once = trim_transparent_border(&padded_block());
        let twice = trim_transparent_border(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn trim_leaves_fully_transparent_image_alone() {
        let img = solid(6, 4, [255, 255, 255, 0]);
        assert_eq!(trim_transparent_border(&img), img);
        assert_eq!(transparent_bounds(&img), None);
    }

    #[test]
    fn bounds_report_block_position() {
        assert_eq!(
            transparent_bounds(&padded_block()),
            Some(PixelRect { x: 4, y: 5, width: 3, height: 2 })
        );
    }

    #[test]
    fn center_offsets_use_floor_division() {
        let img = solid(100, 50, [0, 0, 0, 255]);
        assert_eq!(center_in_box(&img, 225, 175), (62, 62));
        assert_eq!(center_in_box(&img, 100, 50), (0, 0));
        assert_eq!(center_in_box(&img, 97, 50), (-2, 0));
    }

    #[test]
    fn remove_color_threshold_zero_is_identity() {
        let img = padded_block();
        assert_eq!(remove_color(&img, [200, 10, 10], 0.0), img);
    }

    #[test]
    fn remove_color_huge_threshold_clears_everything() {
        let mut img = padded_block();
        img.put_pixel(0, 0, Rgba([0, 255, 0, 255]));
        let out = remove_color(&img, [255, 255, 255], 10_000.0);
        assert!(out.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn remove_color_only_touches_near_pixels() {
        let mut img = solid(2, 1, [250, 250, 250, 255]);
        img.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let out = remove_color(&img, [255, 255, 255], 20.0);
        assert_eq!(out.get_pixel(0, 0).0, [250, 250, 250, 0]);
        assert_eq!(out.get_pixel(1, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn remove_color_distance_is_strictly_below_threshold() {
        // Distance from (255,255,255) to (252,251,255) is exactly 5.
        let img = solid(1, 1, [252, 251, 255, 255]);
        assert_eq!(remove_color(&img, [255, 255, 255], 5.0).get_pixel(0, 0).0[3], 255);
        assert_eq!(remove_color(&img, [255, 255, 255], 5.01).get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn whitespace_ratio_counts_transparent_and_white() {
        let mut img = solid(4, 1, [0, 0, 0, 255]);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([250, 250, 250, 255]));
        assert!((whitespace_ratio(&img, 0, 0, 4, 1) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn whitespace_ratio_clamps_region() {
        let img = solid(4, 4, [255, 255, 255, 255]);
        assert!((whitespace_ratio(&img, -5, -5, 100, 100) - 100.0).abs() < 1e-9);
        assert_eq!(whitespace_ratio(&img, 10, 10, 5, 5), 0.0);
    }
}
