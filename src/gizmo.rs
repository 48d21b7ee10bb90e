//! Screen-space chrome drawn over the canvas planes: the selection outline,
//! the staged layer's border and handles, mask transform handles, the
//! in-progress path outline and the eraser cursor.
//!
//! Sizes here are screen pixels, so chrome keeps its size at every zoom.

use egui::{Color32, Pos2, Rect, Rounding, Shape, Stroke, pos2, vec2};

use crate::geometry::hit_testing;
use crate::geometry::{self, Handle, SelectionBox};
use crate::layer::LAYER_CORNER_RADIUS;
use crate::mask::MaskObject;
use crate::viewport::Viewport;

const LAYER_BORDER_COLOR: Color32 = Color32::from_rgb(0xb3, 0x88, 0xff);
const EDGE_HANDLE_COLOR: Color32 = Color32::from_rgb(0xa8, 0x55, 0xf7);
const CORNER_HANDLE_COLOR: Color32 = Color32::from_rgb(0xec, 0x48, 0x99);
const GLOW_COLOR: Color32 = Color32::from_rgb(0xd9, 0x46, 0xef);
const PATH_COLOR: Color32 = Color32::from_rgb(0xff, 0x00, 0x00);

const LAYER_BORDER_WIDTH: f32 = 2.0;
const LAYER_BORDER_DASH: f32 = 8.0;
const LAYER_EDGE_HANDLE: [f32; 2] = [24.0, 6.0];
const LAYER_CORNER_HANDLE_RADIUS: f32 = 8.0;

const MASK_OUTLINE_WIDTH: f32 = 1.5;
const MASK_DASH: f32 = 4.0;
const MASK_EDGE_HANDLE: [f32; 2] = [12.0, 4.0];
const MASK_CORNER_HANDLE_RADIUS: f32 = 5.0;

const SELECTION_STROKE_WIDTH: f32 = 3.0;
const GLOW_LAYERS: usize = 4;

/// Points per quarter circle when flattening rounded corners
const CORNER_SEGMENTS: usize = 6;

fn white(alpha: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(255, 255, 255, (alpha * 255.0).round() as u8)
}

/// Outline of a rounded rectangle as a closed polyline.
fn rounded_rect_outline(rect: Rect, radius: f32) -> Vec<Pos2> {
    let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
    let corners = [
        (pos2(rect.max.x - r, rect.min.y + r), -90.0f32),
        (pos2(rect.max.x - r, rect.max.y - r), 0.0),
        (pos2(rect.min.x + r, rect.max.y - r), 90.0),
        (pos2(rect.min.x + r, rect.min.y + r), 180.0),
    ];
    let mut points = Vec::with_capacity(4 * (CORNER_SEGMENTS + 1) + 1);
    for (centre, start) in corners {
        for i in 0..=CORNER_SEGMENTS {
            let angle = (start + 90.0 * i as f32 / CORNER_SEGMENTS as f32).to_radians();
            points.push(centre + vec2(angle.cos(), angle.sin()) * r);
        }
    }
    if let Some(first) = points.first().copied() {
        points.push(first);
    }
    points
}

/// A small rectangle of `size` centred on `centre`, rotated by `angle`.
fn rotated_rect(centre: Pos2, size: [f32; 2], angle: f32) -> Vec<Pos2> {
    let (hw, hh) = (size[0] / 2.0, size[1] / 2.0);
    [vec2(-hw, -hh), vec2(hw, -hh), vec2(hw, hh), vec2(-hw, hh)]
        .into_iter()
        .map(|v| centre + geometry::rotate(v, angle))
        .collect()
}

fn closed(mut points: Vec<Pos2>) -> Vec<Pos2> {
    if let Some(first) = points.first().copied() {
        points.push(first);
    }
    points
}

/// Collects chrome shapes for one frame.
#[derive(Debug)]
pub struct ChromePainter {
    canvas: Rect,
    viewport: Viewport,
    shapes: Vec<Shape>,
}

impl ChromePainter {
    pub fn new(canvas: Rect, viewport: Viewport) -> Self {
        Self {
            canvas,
            viewport,
            shapes: Vec::new(),
        }
    }

    fn to_screen(&self, p: Pos2) -> Pos2 {
        self.viewport.document_to_screen(p, self.canvas)
    }

    fn polyline_to_screen(&self, points: &[Pos2]) -> Vec<Pos2> {
        points.iter().map(|p| self.to_screen(*p)).collect()
    }

    pub fn into_shapes(self) -> Vec<Shape> {
        self.shapes
    }

    /// Dashed rounded border around the staged layer.
    pub fn layer_border(&mut self, layer: Rect) {
        let rect = self.viewport.document_rect_to_screen(layer, self.canvas);
        let outline = rounded_rect_outline(rect, LAYER_CORNER_RADIUS * self.viewport.scale);
        self.shapes.extend(Shape::dashed_line(
            &outline,
            Stroke::new(LAYER_BORDER_WIDTH, LAYER_BORDER_COLOR),
            LAYER_BORDER_DASH,
            LAYER_BORDER_DASH,
        ));
    }

    /// Edge bars and corner dots of the staged layer.
    pub fn layer_handles(&mut self, layer: Rect) {
        let rect = self.viewport.document_rect_to_screen(layer, self.canvas);
        let edges = [
            (rect.center_top(), false),
            (rect.center_bottom(), false),
            (rect.left_center(), true),
            (rect.right_center(), true),
        ];
        for (centre, vertical) in edges {
            let [w, h] = LAYER_EDGE_HANDLE;
            let size = if vertical { vec2(h, w) } else { vec2(w, h) };
            let bar = Rect::from_center_size(centre, size);
            let rounding = Rounding::same(h / 2.0);
            self.shapes.push(Shape::rect_filled(bar, rounding, Color32::WHITE));
            self.shapes
                .push(Shape::rect_stroke(bar, rounding, Stroke::new(1.5, EDGE_HANDLE_COLOR)));
        }
        for corner in [rect.left_top(), rect.right_top(), rect.right_bottom(), rect.left_bottom()] {
            self.shapes
                .push(Shape::circle_filled(corner, LAYER_CORNER_HANDLE_RADIUS, Color32::WHITE));
            self.shapes.push(Shape::circle_stroke(
                corner,
                LAYER_CORNER_HANDLE_RADIUS,
                Stroke::new(3.0, CORNER_HANDLE_COLOR),
            ));
        }
    }

    /// Faint outline where a moved mask was cut from.
    pub fn mask_hole(&mut self, mask: &MaskObject, selection: &SelectionBox) {
        let outline = closed(self.polyline_to_screen(&mask.original_outline(selection)));
        self.shapes.push(Shape::line(outline, Stroke::new(1.0, white(0.2))));
    }

    /// Thin outline of a mask under the idle pointer.
    pub fn mask_hover(&mut self, mask: &MaskObject, selection: &SelectionBox) {
        let outline = closed(self.polyline_to_screen(&mask.transformed_outline(selection)));
        self.shapes.push(Shape::line(outline, Stroke::new(1.0, white(0.8))));
    }

    /// Outline, bounding box and transform handles of the selected mask.
    pub fn selected_mask(&mut self, mask: &MaskObject, selection: &SelectionBox) {
        let outline = closed(self.polyline_to_screen(&mask.transformed_outline(selection)));
        if mask.is_transformed() {
            self.shapes
                .push(Shape::line(outline, Stroke::new(MASK_OUTLINE_WIDTH, CORNER_HANDLE_COLOR)));
        } else {
            self.shapes.extend(Shape::dashed_line(
                &outline,
                Stroke::new(MASK_OUTLINE_WIDTH, white(0.8)),
                MASK_DASH,
                MASK_DASH,
            ));
        }

        let handles = hit_testing::mask_handle_positions(mask, selection);
        let (viewport, canvas) = (self.viewport, self.canvas);
        let at = |wanted: Handle| {
            handles
                .iter()
                .find(|(h, _)| *h == wanted)
                .map(|(_, p)| viewport.document_to_screen(*p, canvas))
                .unwrap_or(Pos2::ZERO)
        };

        let bbox = closed(vec![
            at(Handle::NorthWest),
            at(Handle::NorthEast),
            at(Handle::SouthEast),
            at(Handle::SouthWest),
        ]);
        self.shapes.push(Shape::line(bbox, Stroke::new(1.0, white(0.5))));

        let rotate = at(Handle::Rotate);
        self.shapes.push(Shape::line_segment(
            [at(Handle::North), rotate],
            Stroke::new(1.0, white(0.8)),
        ));

        let angle = mask.transform.rotation;
        for handle in [Handle::North, Handle::South, Handle::East, Handle::West] {
            let [w, h] = MASK_EDGE_HANDLE;
            let size = if matches!(handle, Handle::East | Handle::West) { [h, w] } else { [w, h] };
            self.shapes.push(Shape::convex_polygon(
                rotated_rect(at(handle), size, angle),
                Color32::WHITE,
                Stroke::new(1.0, EDGE_HANDLE_COLOR),
            ));
        }
        for handle in [Handle::NorthWest, Handle::NorthEast, Handle::SouthEast, Handle::SouthWest, Handle::Rotate] {
            let p = at(handle);
            self.shapes
                .push(Shape::circle_filled(p, MASK_CORNER_HANDLE_RADIUS, Color32::WHITE));
            self.shapes.push(Shape::circle_stroke(
                p,
                MASK_CORNER_HANDLE_RADIUS,
                Stroke::new(1.5, CORNER_HANDLE_COLOR),
            ));
        }
    }

    /// Outline of the stroke being drawn; `points` are selection-relative.
    pub fn path_outline(&mut self, points: &[Pos2], selection: &SelectionBox) {
        if points.len() < 2 {
            return;
        }
        let offset = selection.origin().to_vec2();
        let outline: Vec<Pos2> = points.iter().map(|p| self.to_screen(*p + offset)).collect();
        self.shapes.push(Shape::line(closed(outline), Stroke::new(1.0, PATH_COLOR)));
    }

    /// Rounded white outline with a soft magenta glow.
    pub fn selection_outline(&mut self, selection: &SelectionBox) {
        let rect = self.viewport.document_rect_to_screen(selection.to_rect(), self.canvas);
        let rounding = Rounding::same(LAYER_CORNER_RADIUS * self.viewport.scale);
        for i in (1..=GLOW_LAYERS).rev() {
            let alpha = 0.35 / i as f32;
            let glow = Color32::from_rgba_unmultiplied(
                GLOW_COLOR.r(),
                GLOW_COLOR.g(),
                GLOW_COLOR.b(),
                (alpha * 255.0) as u8,
            );
            let width = SELECTION_STROKE_WIDTH + 4.0 * i as f32;
            self.shapes.push(Shape::rect_stroke(rect, rounding, Stroke::new(width, glow)));
        }
        self.shapes.push(Shape::rect_stroke(
            rect,
            rounding,
            Stroke::new(SELECTION_STROKE_WIDTH, Color32::WHITE),
        ));
    }

    /// Eraser footprint following the pointer; `diameter` in screen pixels.
    pub fn eraser(&mut self, centre: Pos2, diameter: f32) {
        let radius = diameter / 2.0;
        self.shapes
            .push(Shape::circle_stroke(centre, radius, Stroke::new(1.5, Color32::BLACK)));
        self.shapes
            .push(Shape::circle_stroke(centre, radius, Stroke::new(1.0, white(0.9))));
    }
}
