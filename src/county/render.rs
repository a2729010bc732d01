//! Choropleth rasterisation: counties in lon/lat → transparent RGBA map.
//!
//! The projection is equirectangular with x scaled by the cosine of the mid
//! latitude, which is plenty for a single state. Fills use an even-odd
//! scanline so inner rings (independent cities, lakes) stay holes; outlines
//! are stroked with `imageproc` line segments on top.

use super::County;
use crate::config::MapStyle;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::debug;

/// Lon/lat bounds of a set of counties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    /// Bounds of every ring point, or `None` if there are no points.
    pub fn of(counties: &[County], lon_shift: f64) -> Option<Self> {
        let mut points = counties
            .iter()
            .flat_map(|c| c.rings.iter().flatten())
            .map(|&(lon, lat)| (shift_lon(lon, lon_shift), lat));
        let (lon, lat) = points.next()?;
        let init = GeoBounds {
            min_lon: lon,
            min_lat: lat,
            max_lon: lon,
            max_lat: lat,
        };
        Some(points.fold(init, |b, (lon, lat)| GeoBounds {
            min_lon: b.min_lon.min(lon),
            min_lat: b.min_lat.min(lat),
            max_lon: b.max_lon.max(lon),
            max_lat: b.max_lat.max(lat),
        }))
    }
}

/// Maps lon/lat onto raster pixels.
#[derive(Debug, Clone, Copy)]
struct Projection {
    bounds: GeoBounds,
    cos_lat: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    lon_shift: f64,
}

impl Projection {
    fn fit(bounds: GeoBounds, style: &MapStyle, lon_shift: f64) -> Self {
        let mid_lat = (bounds.min_lat + bounds.max_lat) / 2.0;
        let cos_lat = mid_lat.to_radians().cos().max(0.1);
        let geo_w = ((bounds.max_lon - bounds.min_lon) * cos_lat).max(f64::EPSILON);
        let geo_h = (bounds.max_lat - bounds.min_lat).max(f64::EPSILON);

        let avail_w = style.width.saturating_sub(style.margin.saturating_mul(2)).max(1) as f64;
        let avail_h = style.height.saturating_sub(style.margin.saturating_mul(2)).max(1) as f64;
        let scale = (avail_w / geo_w).min(avail_h / geo_h);

        Projection {
            bounds,
            cos_lat,
            scale,
            offset_x: (style.width as f64 - geo_w * scale) / 2.0,
            offset_y: (style.height as f64 - geo_h * scale) / 2.0,
            lon_shift,
        }
    }

    fn project(&self, (lon, lat): (f64, f64)) -> (f64, f64) {
        let lon = shift_lon(lon, self.lon_shift);
        (
            self.offset_x + (lon - self.bounds.min_lon) * self.cos_lat * self.scale,
            self.offset_y + (self.bounds.max_lat - lat) * self.scale,
        )
    }
}

fn shift_lon(lon: f64, shift: f64) -> f64 {
    if lon > 0.0 {
        lon + shift
    } else {
        lon
    }
}

/// Shift applied to positive longitudes so sets that straddle the
/// antimeridian (the Aleutians) stay contiguous.
fn antimeridian_shift(counties: &[County]) -> f64 {
    let lons = counties.iter().flat_map(|c| c.rings.iter().flatten()).map(|p| p.0);
    let (mut east, mut far_west) = (false, false);
    for lon in lons {
        east |= lon > 90.0;
        far_west |= lon < -90.0;
    }
    if east && far_west {
        -360.0
    } else {
        0.0
    }
}

/// Render `counties` into a transparent `style.width × style.height` map.
///
/// Every county is filled with `style.base_fill`; the county whose id equals
/// `highlight_id` is filled with `style.highlight_fill`. Outlines are drawn
/// last when `style.outline` is set.
pub fn render_choropleth(counties: &[County], highlight_id: Option<&str>, style: &MapStyle) -> RgbaImage {
    let mut canvas = RgbaImage::new(style.width, style.height);
    let lon_shift = antimeridian_shift(counties);
    let Some(bounds) = GeoBounds::of(counties, lon_shift) else {
        return canvas;
    };
    let projection = Projection::fit(bounds, style, lon_shift);

    let projected: Vec<Vec<Vec<(f64, f64)>>> = counties
        .iter()
        .map(|c| {
            c.rings
                .iter()
                .map(|ring| ring.iter().map(|&p| projection.project(p)).collect())
                .collect()
        })
        .collect();

    for (county, rings) in counties.iter().zip(&projected) {
        let fill = if highlight_id == Some(county.id.as_str()) {
            style.highlight_fill
        } else {
            style.base_fill
        };
        fill_even_odd(&mut canvas, rings, fill.to_rgba(255));
    }

    if let Some(outline) = style.outline {
        let color = outline.to_rgba(255);
        for ring in projected.iter().flatten() {
            for seg in ring.windows(2) {
                let (a, b) = (seg[0], seg[1]);
                draw_line_segment_mut(&mut canvas, (a.0 as f32, a.1 as f32), (b.0 as f32, b.1 as f32), color);
            }
        }
    }

    debug!(
        "Rendered {} counties into {}x{} map (highlight {:?})",
        counties.len(),
        style.width,
        style.height,
        highlight_id
    );
    canvas
}

/// Fill the area enclosed by `rings` using the even-odd rule, sampling at
/// pixel centers.
fn fill_even_odd(canvas: &mut RgbaImage, rings: &[Vec<(f64, f64)>], color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    let min_y = rings.iter().flatten().map(|p| p.1).fold(f64::MAX, f64::min);
    let max_y = rings.iter().flatten().map(|p| p.1).fold(f64::MIN, f64::max);
    if min_y > max_y {
        return;
    }

    let row_start = min_y.floor().max(0.0) as u32;
    let row_end = (max_y.ceil().max(0.0) as u32).min(h);
    let mut crossings: Vec<f64> = Vec::new();

    for row in row_start..row_end {
        let sy = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            // Rings from shapefiles are closed, but unclosed input still works.
            let n = ring.len();
            for i in 0..n {
                let (x0, y0) = ring[i];
                let (x1, y1) = ring[(i + 1) % n];
                if (y0 <= sy && y1 > sy) || (y1 <= sy && y0 > sy) {
                    crossings.push(x0 + (sy - y0) / (y1 - y0) * (x1 - x0));
                }
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for pair in crossings.chunks_exact(2) {
            // Pixel x is inside when its center x + 0.5 lies in [left, right).
            let start = (pair[0] - 0.5).ceil().max(0.0) as u32;
            let end = ((pair[1] - 0.5).ceil().max(0.0) as u32).min(w);
            for x in start..end {
                canvas.put_pixel(x, row, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HexColor;

    fn county(id: &str, rings: Vec<Vec<(f64, f64)>>) -> County {
        County {
            id: id.into(),
            name: id.into(),
            state: "00".into(),
            rings,
        }
    }

    fn square(x: f64, y: f64, s: f64) -> Vec<(f64, f64)> {
        vec![(x, y), (x, y + s), (x + s, y + s), (x + s, y), (x, y)]
    }

    fn style() -> MapStyle {
        MapStyle {
            width: 100,
            height: 50,
            margin: 0,
            base_fill: HexColor([200, 200, 200]),
            highlight_fill: HexColor([0, 0, 255]),
            outline: None,
        }
    }

    #[test]
    fn highlight_uses_highlight_fill() {
        // Two 1°×1° squares side by side at the equator fill a 2:1 raster.
        let counties = vec![
            county("west", vec![square(0.0, 0.0, 1.0)]),
            county("east", vec![square(1.0, 0.0, 1.0)]),
        ];
        let map = render_choropleth(&counties, Some("east"), &style());
        assert_eq!(map.get_pixel(25, 25).0, [200, 200, 200, 255]);
        assert_eq!(map.get_pixel(75, 25).0, [0, 0, 255, 255]);
    }

    #[test]
    fn no_highlight_fills_everything_with_base() {
        let counties = vec![county("only", vec![square(10.0, 0.0, 1.0)])];
        let map = render_choropleth(&counties, None, &MapStyle { width: 50, ..style() });
        assert_eq!(map.get_pixel(25, 25).0, [200, 200, 200, 255]);
    }

    #[test]
    fn outside_shapes_stays_transparent() {
        let counties = vec![county("sq", vec![square(0.0, 0.0, 1.0)])];
        let map = render_choropleth(&counties, None, &style());
        // A square in a 2:1 raster leaves the left and right quarters empty.
        assert_eq!(map.get_pixel(5, 25).0[3], 0);
        assert_eq!(map.get_pixel(95, 25).0[3], 0);
        assert_eq!(map.get_pixel(50, 25).0[3], 255);
    }

    #[test]
    fn inner_ring_is_a_hole() {
        let counties = vec![county(
            "donut",
            vec![square(0.0, 0.0, 3.0), square(1.0, 1.0, 1.0)],
        )];
        let s = MapStyle { width: 90, height: 90, ..style() };
        let map = render_choropleth(&counties, None, &s);
        assert_eq!(map.get_pixel(45, 45).0[3], 0);
        assert_eq!(map.get_pixel(15, 15).0[3], 255);
    }

    #[test]
    fn outlines_are_drawn_on_top() {
        let counties = vec![county("sq", vec![square(0.0, 0.0, 1.0)])];
        let s = MapStyle {
            width: 50,
            outline: Some(HexColor([255, 0, 0])),
            ..style()
        };
        let map = render_choropleth(&counties, None, &s);
        assert_eq!(map.get_pixel(0, 25).0, [255, 0, 0, 255]);
    }

    #[test]
    fn empty_input_gives_transparent_map() {
        let map = render_choropleth(&[], None, &style());
        assert_eq!(map.dimensions(), (100, 50));
        assert!(map.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn antimeridian_sets_are_kept_together() {
        let counties = vec![
            county("east", vec![square(179.0, 50.0, 0.5)]),
            county("west", vec![square(-179.5, 50.0, 0.5)]),
        ];
        assert_eq!(antimeridian_shift(&counties), -360.0);
        let b = GeoBounds::of(&counties, -360.0).unwrap();
        assert!((b.min_lon - -181.0).abs() < 1e-9);
        assert!((b.max_lon - -179.0).abs() < 1e-9);
    }
}
