//! Soft round brush used by the staged-layer eraser. A kernel is a square
//! grey bitmap holding a radial falloff; strokes stamp it into a mask buffer
//! with "lighten" (per-pixel max), so overlapping stamps never accumulate.

use egui::{Pos2, Vec2};
use image::{GrayImage, Luma};

/// Gradient stops used when softness is above zero: (position, grey)
const SOFT_STOPS: [(f32, f32); 5] = [
    (0.0, 255.0),
    (0.25, 238.0),
    (0.5, 170.0),
    (0.75, 85.0),
    (1.0, 0.0),
];
const HARD_STOPS: [(f32, f32); 2] = [(0.0, 255.0), (1.0, 0.0)];

/// Stamp spacing as a fraction of the radius
const STEP_FRACTION: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct BrushKernel {
    radius: f32,
    softness: f32,
    bitmap: GrayImage,
}

impl BrushKernel {
    pub fn new(radius: f32, softness: f32) -> Self {
        let radius = radius.max(0.0);
        let side = (radius * 2.0).ceil() as u32 + 4;
        let centre = side as f32 / 2.0;

        let mut inner = radius * (1.0 - softness / 100.0);
        if inner >= radius - 0.5 {
            inner = (radius - 1.0).max(0.0);
        }
        let stops: &[(f32, f32)] = if softness > 0.0 { &SOFT_STOPS } else { &HARD_STOPS };

        let bitmap = GrayImage::from_fn(side, side, |x, y| {
            let dx = x as f32 + 0.5 - centre;
            let dy = y as f32 + 0.5 - centre;
            let d = (dx * dx + dy * dy).sqrt();
            let value = if d > radius {
                0.0
            } else if d <= inner {
                255.0
            } else {
                gradient_at(stops, (d - inner) / (radius - inner))
            };
            Luma([value.round().clamp(0.0, 255.0) as u8])
        });

        Self { radius, softness, bitmap }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn softness(&self) -> f32 {
        self.softness
    }

    pub fn side(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn bitmap(&self) -> &GrayImage {
        &self.bitmap
    }

    /// Lightens the kernel into `target`, centred on `at`.
    pub fn stamp(&self, target: &mut GrayImage, at: Pos2) {
        let half = self.side() as f32 / 2.0;
        let ox = (at.x - half).round() as i64;
        let oy = (at.y - half).round() as i64;
        let (tw, th) = (target.width() as i64, target.height() as i64);

        for (kx, ky, k) in self.bitmap.enumerate_pixels() {
            if k.0[0] == 0 {
                continue;
            }
            let (x, y) = (ox + kx as i64, oy + ky as i64);
            if x < 0 || y < 0 || x >= tw || y >= th {
                continue;
            }
            let dst = target.get_pixel_mut(x as u32, y as u32);
            dst.0[0] = dst.0[0].max(k.0[0]);
        }
    }
}

fn gradient_at(stops: &[(f32, f32)], t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    for pair in stops.windows(2) {
        let ((t0, v0), (t1, v1)) = (pair[0], pair[1]);
        if t <= t1 {
            let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            return v0 + (v1 - v0) * f;
        }
    }
    stops.last().map(|(_, v)| *v).unwrap_or(0.0)
}

/// Holds the most recently built kernel and rebuilds it only when the
/// requested parameters drift far enough.
#[derive(Debug, Clone, Default)]
pub struct BrushCache {
    kernel: Option<BrushKernel>,
    rebuilds: usize,
}

impl BrushCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kernel(&mut self, radius: f32, softness: f32) -> &BrushKernel {
        let stale = match &self.kernel {
            None => true,
            Some(k) => (k.radius - radius).abs() > 0.5 || k.softness != softness,
        };
        if stale {
            log::debug!("Rebuilding brush kernel: radius {radius:.1}, softness {softness}");
            self.rebuilds += 1;
            self.kernel = Some(BrushKernel::new(radius, softness));
        }
        self.kernel
            .get_or_insert_with(|| BrushKernel::new(radius, softness))
    }

    /// Number of kernel rebuilds so far
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }
}

/// Stamps a stroke segment into a mask buffer.
///
/// With no previous position this is a single stamp at `to`. Otherwise the
/// kernel is stamped every `max(1, radius / 4)` pixels from `from` towards
/// `to`, then once at `to`. Returns the position to continue from.
pub fn stamp_segment(
    target: &mut GrayImage,
    kernel: &BrushKernel,
    from: Option<Pos2>,
    to: Pos2,
) -> Pos2 {
    if let Some(from) = from {
        let delta: Vec2 = to - from;
        let distance = delta.length();
        if distance > 0.0 {
            let step = (kernel.radius() * STEP_FRACTION).max(1.0);
            let dir = delta / distance;
            let mut travelled = 0.0;
            while travelled < distance {
                kernel.stamp(target, from + dir * travelled);
                travelled += step;
            }
        }
    }
    kernel.stamp(target, to);
    to
}

/// Converts an on-screen brush diameter into a radius in the staged layer's
/// image pixels.
pub fn brush_radius_in_image(
    size_screen_px: f32,
    viewport_scale: f32,
    image_size: Vec2,
    layer_size: Vec2,
) -> f32 {
    let document_size = size_screen_px / viewport_scale;
    let to_image = ((image_size.x / layer_size.x) + (image_size.y / layer_size.y)) / 2.0;
    document_size * to_image / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    #[test]
    fn test_kernel_shape() {
        let k = BrushKernel::new(10.0, 50.0);
        assert_eq!(k.side(), 24);
        let centre = k.bitmap().get_pixel(12, 12).0[0];
        assert_eq!(centre, 255);
        assert_eq!(k.bitmap().get_pixel(0, 0).0[0], 0);
        // Values fall off towards the rim.
        let mid = k.bitmap().get_pixel(12 + 7, 12).0[0];
        assert!(mid < 255 && mid > 0, "mid = {mid}");
    }

    #[test]
    fn test_hard_kernel_keeps_one_pixel_falloff() {
        let k = BrushKernel::new(10.0, 0.0);
        // Inner radius is pulled in to r - 1, so everything inside 9px is solid.
        assert_eq!(k.bitmap().get_pixel(12 + 8, 12).0[0], 255);
        assert_eq!(k.bitmap().get_pixel(12 + 11, 12).0[0], 0);
    }

    #[test]
    fn test_cache_rebuild_predicate() {
        let mut cache = BrushCache::new();
        cache.kernel(10.0, 50.0);
        cache.kernel(10.4, 50.0);
        assert_eq!(cache.rebuilds(), 1);
        cache.kernel(10.6, 50.0);
        assert_eq!(cache.rebuilds(), 2);
        cache.kernel(10.6, 20.0);
        assert_eq!(cache.rebuilds(), 3);
    }

    #[test]
    fn test_lighten_is_idempotent() {
        let k = BrushKernel::new(6.0, 50.0);
        let mut once = GrayImage::new(40, 40);
        stamp_segment(&mut once, &k, Some(pos2(5.0, 20.0)), pos2(35.0, 20.0));
        let mut twice = once.clone();
        stamp_segment(&mut twice, &k, Some(pos2(5.0, 20.0)), pos2(35.0, 20.0));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_segment_covers_path() {
        let k = BrushKernel::new(4.0, 0.0);
        let mut buf = GrayImage::new(50, 10);
        let end = stamp_segment(&mut buf, &k, Some(pos2(5.0, 5.0)), pos2(45.0, 5.0));
        assert_eq!(end, pos2(45.0, 5.0));
        for x in 5..45 {
            assert!(buf.get_pixel(x, 5).0[0] > 0, "gap at {x}");
        }
    }

    #[test]
    fn test_stamp_clips_at_edges() {
        let k = BrushKernel::new(8.0, 0.0);
        let mut buf = GrayImage::new(10, 10);
        k.stamp(&mut buf, pos2(0.0, 0.0));
        assert_eq!(buf.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn test_brush_radius_conversion() {
        // 50 screen px at 2x zoom on a layer shown at half its image resolution.
        let r = brush_radius_in_image(50.0, 2.0, vec2(200.0, 200.0), vec2(100.0, 100.0));
        assert!((r - 25.0).abs() < 1e-5);
    }
}
