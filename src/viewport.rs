use egui::{Pos2, Rect, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::geometry;

/// Top margin left above the document when fitting it to the canvas
const FIT_TOP_MARGIN: f32 = 20.0;

/// Maps document space onto the canvas: `screen = canvas.min + offset +
/// document * scale`. Not part of any history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scale: f32,
    /// Offset of the document origin from the canvas origin, screen pixels
    pub x: f32,
    pub y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl Viewport {
    /// Fits a freshly loaded document: never magnifies, centred
    /// horizontally, a small margin from the top.
    pub fn fit(container_width: f32, document_size: Vec2) -> Self {
        if document_size.x <= 0.0 || container_width <= 0.0 {
            return Self::default();
        }
        let scale = (container_width / document_size.x).min(1.0);
        Self {
            scale,
            x: (container_width - document_size.x * scale) / 2.0,
            y: FIT_TOP_MARGIN,
        }
    }

    pub fn offset(&self) -> Vec2 {
        vec2(self.x, self.y)
    }

    /// Where the document is drawn on screen.
    pub fn display_rect(&self, canvas: Rect, document_size: Vec2) -> Rect {
        Rect::from_min_size(canvas.min + self.offset(), document_size * self.scale)
    }

    pub fn screen_to_document(&self, screen: Pos2, canvas: Rect, document_size: Vec2) -> Pos2 {
        let display = self.display_rect(canvas, document_size);
        if display.width() <= 0.0 || display.height() <= 0.0 {
            return pos2((screen.x - display.min.x) / self.scale, (screen.y - display.min.y) / self.scale);
        }
        geometry::to_document_space(screen, display, document_size)
    }

    pub fn document_to_screen(&self, p: Pos2, canvas: Rect) -> Pos2 {
        canvas.min + self.offset() + p.to_vec2() * self.scale
    }

    pub fn document_rect_to_screen(&self, rect: Rect, canvas: Rect) -> Rect {
        Rect::from_min_max(
            self.document_to_screen(rect.min, canvas),
            self.document_to_screen(rect.max, canvas),
        )
    }

    /// Zooms by one wheel step, keeping the document point under `anchor`
    /// (canvas-relative screen position) fixed. Positive `delta_y` zooms out.
    pub fn zoom_at(&mut self, anchor: Pos2, delta_y: f32, config: &EditorConfig) {
        let factor = 1.0 - delta_y * config.zoom_sensitivity;
        let scale = (self.scale * factor).clamp(config.min_zoom, config.max_zoom);
        let ratio = scale / self.scale;
        self.x = anchor.x - (anchor.x - self.x) * ratio;
        self.y = anchor.y - (anchor.y - self.y) * ratio;
        self.scale = scale;
    }

    /// The viewport after dragging by `screen_delta` from `self`.
    pub fn panned(&self, screen_delta: Vec2) -> Self {
        Self {
            x: self.x + screen_delta.x,
            y: self.y + screen_delta.y,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Rect {
        Rect::from_min_size(pos2(100.0, 50.0), vec2(800.0, 600.0))
    }

    #[test]
    fn test_fit_never_magnifies() {
        let v = Viewport::fit(800.0, vec2(400.0, 300.0));
        assert_eq!(v.scale, 1.0);
        assert_eq!(v.x, 200.0);
        assert_eq!(v.y, 20.0);

        let v = Viewport::fit(800.0, vec2(1600.0, 900.0));
        assert_eq!(v.scale, 0.5);
        assert_eq!(v.x, 0.0);
    }

    #[test]
    fn test_screen_document_round_trip() {
        let v = Viewport {
            scale: 0.5,
            x: 30.0,
            y: 40.0,
        };
        let doc = vec2(1000.0, 800.0);
        let p = pos2(123.0, 456.0);
        let screen = v.document_to_screen(p, canvas());
        let back = v.screen_to_document(screen, canvas(), doc);
        assert!((back - p).length() < 1e-3);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let config = EditorConfig::default();
        let mut v = Viewport {
            scale: 1.0,
            x: 10.0,
            y: 20.0,
        };
        let doc = vec2(1000.0, 800.0);
        let anchor = pos2(300.0, 200.0);
        let before = v.screen_to_document(canvas().min + anchor.to_vec2(), canvas(), doc);
        v.zoom_at(anchor, -200.0, &config);
        assert!((v.scale - 1.1).abs() < 1e-5);
        let after = v.screen_to_document(canvas().min + anchor.to_vec2(), canvas(), doc);
        assert!((before - after).length() < 1e-3);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let config = EditorConfig::default();
        let mut v = Viewport::default();
        for _ in 0..200 {
            v.zoom_at(Pos2::ZERO, 1000.0, &config);
        }
        assert_eq!(v.scale, config.min_zoom);
        for _ in 0..500 {
            v.zoom_at(Pos2::ZERO, -1000.0, &config);
        }
        assert_eq!(v.scale, config.max_zoom);
    }
}
