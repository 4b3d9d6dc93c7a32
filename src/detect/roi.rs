//! Region of interest: normalized polygon and its pixel mask.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Mask value for pixels inside the region.
pub const MASK_ACTIVE: u8 = 255;

/// Default guarded region, an L-shaped polygon in normalized (x, y).
pub const DEFAULT_ROI_POINTS: [[f64; 2]; 6] = [
    [0.25, 0.08],
    [0.85, 0.08],
    [0.85, 0.44],
    [0.38, 0.44],
    [0.38, 0.70],
    [0.25, 0.70],
];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoiPoint {
    pub x: f64,
    pub y: f64,
}

impl RoiPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Ordered polygon vertices in normalized [0, 1] coordinates.
///
/// Insertion order defines the boundary. Self-intersecting polygons are accepted
/// but filled with the even-odd rule, so overlapping lobes cancel out.
#[derive(Clone, Debug, PartialEq)]
pub struct RoiPolygon {
    points: Vec<RoiPoint>,
}

impl RoiPolygon {
    pub fn new(points: Vec<RoiPoint>) -> Result<Self> {
        if points.len() < 3 {
            return Err(anyhow!(
                "roi polygon needs at least 3 vertices, got {}",
                points.len()
            ));
        }
        for (i, p) in points.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(anyhow!("roi vertex {} is not finite", i + 1));
            }
            if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                return Err(anyhow!(
                    "roi vertex {} ({}, {}) is outside the normalized range [0, 1]",
                    i + 1,
                    p.x,
                    p.y
                ));
            }
        }
        Ok(Self { points })
    }

    pub fn from_pairs(pairs: &[[f64; 2]]) -> Result<Self> {
        Self::new(pairs.iter().map(|[x, y]| RoiPoint::new(*x, *y)).collect())
    }

    pub fn points(&self) -> &[RoiPoint] {
        &self.points
    }

    /// Vertices scaled to a frame and truncated toward zero to integer pixel
    /// coordinates. A vertex at 1.0 lands one past the last column or row.
    pub fn to_pixels(&self, width: u32, height: u32) -> Vec<(i32, i32)> {
        self.points
            .iter()
            .map(|p| {
                (
                    (p.x * f64::from(width)) as i32,
                    (p.y * f64::from(height)) as i32,
                )
            })
            .collect()
    }
}

impl Default for RoiPolygon {
    fn default() -> Self {
        Self {
            points: DEFAULT_ROI_POINTS
                .iter()
                .map(|[x, y]| RoiPoint::new(*x, *y))
                .collect(),
        }
    }
}

// ----------------------------------------------------------------------------
// RoiMask
// ----------------------------------------------------------------------------

/// Binary mask, `MASK_ACTIVE` inside the polygon and 0 elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoiMask {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    active: usize,
}

impl RoiMask {
    /// Rasterize `polygon` for a `width` x `height` frame.
    ///
    /// Pixels are sampled at their integer coordinates. The interior is filled
    /// by the even-odd rule and every edge is then drawn as an 8-connected
    /// line, so boundary pixels on every side belong to the region.
    pub fn build(polygon: &RoiPolygon, width: u32, height: u32) -> Self {
        let vertices = polygon.to_pixels(width, height);
        let mut mask = Self {
            data: vec![0u8; width as usize * height as usize],
            width,
            height,
            active: 0,
        };
        if vertices.is_empty() || width == 0 || height == 0 {
            return mask;
        }

        let mut crossings: Vec<f64> = Vec::with_capacity(vertices.len());
        for row in 0..height as i32 {
            let y = f64::from(row);
            crossings.clear();
            for (i, &from) in vertices.iter().enumerate() {
                let to = vertices[(i + 1) % vertices.len()];
                let (x0, y0) = (f64::from(from.0), f64::from(from.1));
                let (x1, y1) = (f64::from(to.0), f64::from(to.1));
                // Half-open in y so a shared vertex is crossed once.
                if (y0 <= y) != (y1 <= y) {
                    crossings.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for span in crossings.chunks_exact(2) {
                let start = span[0].ceil() as i32;
                let end = span[1].floor() as i32;
                for x in start..=end {
                    mask.set(x, row);
                }
            }
        }

        for (i, &from) in vertices.iter().enumerate() {
            mask.draw_edge(from, vertices[(i + 1) % vertices.len()]);
        }
        mask
    }

    fn set(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let px = &mut self.data[y as usize * self.width as usize + x as usize];
        if *px == 0 {
            *px = MASK_ACTIVE;
            self.active += 1;
        }
    }

    /// Bresenham line between two vertices, endpoints included.
    fn draw_edge(&mut self, (mut x, mut y): (i32, i32), (x1, y1): (i32, i32)) {
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set(x, y);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_active(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize] == MASK_ACTIVE
    }

    /// Number of pixels inside the region.
    pub fn active_pixels(&self) -> usize {
        self.active
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Caches the mask for the most recent frame size.
#[derive(Clone, Debug)]
pub struct RoiMaskCache {
    polygon: RoiPolygon,
    mask: Option<RoiMask>,
}

impl RoiMaskCache {
    pub fn new(polygon: RoiPolygon) -> Self {
        Self {
            polygon,
            mask: None,
        }
    }

    pub fn polygon(&self) -> &RoiPolygon {
        &self.polygon
    }

    /// Mask for the given frame size, rebuilt only when the size changes.
    pub fn mask_for(&mut self, width: u32, height: u32) -> &RoiMask {
        let stale = self
            .mask
            .as_ref()
            .map_or(true, |mask| mask.dimensions() != (width, height));
        if stale {
            log::debug!("roi mask rebuilt for {}x{}", width, height);
            self.mask = Some(RoiMask::build(&self.polygon, width, height));
        }
        self.mask.get_or_insert_with(|| RoiMask::build(&self.polygon, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> RoiPolygon {
        RoiPolygon::from_pairs(&[[0.0, 0.0], [0.5, 0.0], [0.5, 0.5], [0.0, 0.5]]).unwrap()
    }

    #[test]
    fn polygon_requires_three_vertices() {
        assert!(RoiPolygon::from_pairs(&[[0.1, 0.1], [0.9, 0.9]]).is_err());
        assert!(RoiPolygon::from_pairs(&[[0.1, 0.1], [0.9, 0.1], [0.5, 0.9]]).is_ok());
    }

    #[test]
    fn polygon_rejects_out_of_range_vertices() {
        assert!(RoiPolygon::from_pairs(&[[0.1, 0.1], [1.2, 0.1], [0.5, 0.9]]).is_err());
        assert!(RoiPolygon::from_pairs(&[[0.1, f64::NAN], [0.9, 0.1], [0.5, 0.9]]).is_err());
    }

    #[test]
    fn square_includes_its_boundary() {
        let mask = RoiMask::build(&square(), 10, 10);
        // Vertices land on (0, 0) and (5, 5); both boundary rows and columns are in.
        assert_eq!(mask.active_pixels(), 36);
        assert!(mask.is_active(0, 0));
        assert!(mask.is_active(5, 5));
        assert!(mask.is_active(5, 0));
        assert!(!mask.is_active(6, 5));
        assert!(!mask.is_active(5, 6));
        assert_eq!(
            mask.as_slice().iter().filter(|&&v| v == MASK_ACTIVE).count(),
            36
        );
    }

    #[test]
    fn default_region_is_concave() {
        let mask = RoiMask::build(&RoiPolygon::default(), 100, 100);
        // Band x 25..=85, y 8..=44 plus leg x 25..=38, y 45..=70.
        assert_eq!(mask.active_pixels(), 61 * 37 + 14 * 26);
        assert!(mask.is_active(30, 60));
        assert!(mask.is_active(38, 70));
        assert!(mask.is_active(85, 44));
        assert!(!mask.is_active(39, 45));
        // Inside the bounding box but in the notch.
        assert!(!mask.is_active(60, 60));
    }

    #[test]
    fn vertices_truncate_toward_zero() {
        assert_eq!(
            RoiPolygon::default().to_pixels(1280, 720),
            vec![
                (320, 57),
                (1088, 57),
                (1088, 316),
                (486, 316),
                (486, 503),
                (320, 503)
            ]
        );
    }

    #[test]
    fn full_frame_region_covers_every_pixel() {
        let full =
            RoiPolygon::from_pairs(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).unwrap();
        assert_eq!(RoiMask::build(&full, 7, 5).active_pixels(), 35);
    }

    #[test]
    fn slanted_edges_include_both_endpoints() {
        let triangle = RoiPolygon::from_pairs(&[[0.0, 0.0], [0.9, 0.0], [0.0, 0.9]]).unwrap();
        let mask = RoiMask::build(&triangle, 10, 10);
        // Right triangle with legs 0..=9: 10 + 9 + ... + 1 lattice points.
        assert_eq!(mask.active_pixels(), 55);
        assert!(mask.is_active(9, 0));
        assert!(mask.is_active(0, 9));
        assert!(mask.is_active(5, 4));
        assert!(!mask.is_active(5, 5));
    }

    #[test]
    fn mask_area_grows_with_frame_area() {
        let polygon = RoiPolygon::default();
        let sizes = [(16, 12), (32, 24), (64, 48), (100, 100), (160, 120), (320, 240)];
        let mut previous = 0usize;
        for (w, h) in sizes {
            let active = RoiMask::build(&polygon, w, h).active_pixels();
            assert!(
                active >= previous,
                "{}x{} produced {} active pixels, less than {}",
                w,
                h,
                active,
                previous
            );
            previous = active;
        }
        assert!(previous > 0);
    }

    #[test]
    fn cache_rebuilds_on_size_change() {
        let mut cache = RoiMaskCache::new(square());
        assert_eq!(cache.mask_for(10, 10).active_pixels(), 36);
        assert_eq!(cache.mask_for(10, 10).dimensions(), (10, 10));
        assert_eq!(cache.mask_for(20, 20).active_pixels(), 121);
        assert_eq!(cache.mask_for(20, 20).dimensions(), (20, 20));
    }
}
