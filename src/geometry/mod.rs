//! Coordinate conversion and polygon math shared by the editor, the request
//! builder and the renderer. Everything here works in document pixels unless
//! a function says otherwise.

pub mod handle;
pub mod hit_testing;

pub use handle::Handle;

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};

/// The user's rectangular region of interest, in document pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SelectionBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalised box spanned by two corners, in either order.
    pub fn from_corners(a: Pos2, b: Pos2) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn origin(&self) -> Pos2 {
        pos2(self.x, self.y)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_min_size(self.origin(), vec2(self.width, self.height))
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: Pos2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn is_smaller_than(&self, min_size: f32) -> bool {
        self.width < min_size || self.height < min_size
    }

    /// Integer pixel rectangle `(x, y, width, height)` obtained by flooring
    /// every component.
    pub fn floored(&self) -> PixelRect {
        PixelRect {
            x: self.x.floor() as i64,
            y: self.y.floor() as i64,
            width: self.width.floor().max(0.0) as u32,
            height: self.height.floor().max(0.0) as u32,
        }
    }
}

/// An integer pixel rectangle. The origin may lie outside the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Maps a screen position into document space given where the document is
/// displayed on screen and the document's pixel size.
pub fn to_document_space(screen: Pos2, display_rect: Rect, surface_size: Vec2) -> Pos2 {
    let scale_x = surface_size.x / display_rect.width();
    let scale_y = surface_size.y / display_rect.height();
    pos2(
        (screen.x - display_rect.min.x) * scale_x,
        (screen.y - display_rect.min.y) * scale_y,
    )
}

/// Even-odd ray casting test against a closed polygon.
pub fn point_in_polygon(p: Pos2, polygon: &[Pos2]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// X coordinates where the horizontal line at `y` crosses the polygon's
/// edges, sorted ascending. Pairs of crossings bound the interior spans,
/// consistent with [`point_in_polygon`].
pub fn scanline_crossings(polygon: &[Pos2], y: f32) -> Vec<f32> {
    let mut xs = Vec::new();
    let n = polygon.len();
    if n < 3 {
        return xs;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > y) != (b.y > y) {
            xs.push((b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x);
        }
        j = i;
    }
    xs.sort_by(f32::total_cmp);
    xs
}

/// Axis-aligned bounds of a point set. Empty input yields `Rect::NOTHING`.
pub fn polygon_bounds(points: &[Pos2]) -> Rect {
    if points.is_empty() {
        return Rect::NOTHING;
    }
    let mut rect = Rect::from_min_max(points[0], points[0]);
    for p in &points[1..] {
        rect.extend_with(*p);
    }
    rect
}

/// Rotates `v` by `angle` radians (positive is clockwise on screen, y down).
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    vec2(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

pub fn clamp_to_size(p: Pos2, width: f32, height: f32) -> Pos2 {
    pos2(p.x.clamp(0.0, width), p.y.clamp(0.0, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Pos2> {
        vec![pos2(0.0, 0.0), pos2(10.0, 0.0), pos2(10.0, 10.0), pos2(0.0, 10.0)]
    }

    #[test]
    fn test_to_document_space_scales_per_axis() {
        let display = Rect::from_min_size(pos2(100.0, 50.0), vec2(200.0, 100.0));
        let doc = to_document_space(pos2(200.0, 100.0), display, vec2(400.0, 400.0));
        assert_eq!(doc, pos2(200.0, 200.0));
    }

    #[test]
    fn test_point_in_polygon() {
        let poly = square();
        assert!(point_in_polygon(pos2(5.0, 5.0), &poly));
        assert!(!point_in_polygon(pos2(15.0, 5.0), &poly));
        assert!(!point_in_polygon(pos2(5.0, -0.1), &poly));
        assert!(!point_in_polygon(pos2(5.0, 5.0), &poly[..2]));
    }

    #[test]
    fn test_scanline_matches_point_test() {
        let poly = vec![pos2(1.0, 1.0), pos2(9.0, 2.0), pos2(4.0, 9.0)];
        for row in 0..10 {
            let y = row as f32 + 0.5;
            let xs = scanline_crossings(&poly, y);
            assert_eq!(xs.len() % 2, 0);
            for col in 0..10 {
                let x = col as f32 + 0.5;
                let in_span = xs.chunks(2).any(|pair| x >= pair[0] && x < pair[1]);
                assert_eq!(in_span, point_in_polygon(pos2(x, y), &poly), "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_selection_from_corners_normalises() {
        let sel = SelectionBox::from_corners(pos2(50.0, 80.0), pos2(10.0, 20.0));
        assert_eq!(sel, SelectionBox::new(10.0, 20.0, 40.0, 60.0));
        assert!(sel.contains(pos2(10.0, 20.0)));
        assert!(!sel.contains(pos2(51.0, 20.0)));
    }

    #[test]
    fn test_floored_selection() {
        let px = SelectionBox::new(10.7, -2.2, 30.9, 5.5).floored();
        assert_eq!(px, PixelRect { x: 10, y: -3, width: 30, height: 5 });
    }
}
