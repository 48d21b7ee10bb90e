use egui::{Pos2, Rect, pos2};

use super::{Handle, SelectionBox, point_in_polygon};
use crate::mask::MaskObject;

/// Mask handle grab radius in screen pixels
pub const MASK_HANDLE_RADIUS: f32 = 15.0;
/// Staged layer handle grab radius in screen pixels
pub const LAYER_HANDLE_RADIUS: f32 = 20.0;
/// Distance of the rotate handle above the mask's top edge, in outline units
pub const ROTATE_HANDLE_OFFSET: f32 = 20.0;

/// Order in which mask handles are tested; the first hit wins.
const MASK_HANDLE_PRIORITY: [Handle; 9] = [
    Handle::Rotate,
    Handle::NorthWest,
    Handle::NorthEast,
    Handle::SouthWest,
    Handle::SouthEast,
    Handle::North,
    Handle::South,
    Handle::East,
    Handle::West,
];

pub fn point_in_mask_object(p: Pos2, mask: &MaskObject, selection: &SelectionBox) -> bool {
    point_in_polygon(mask.document_to_local(p, selection), mask.points())
}

/// Bounding box of the untransformed outline, relative to the pivot.
pub fn mask_bounding_box(mask: &MaskObject) -> Rect {
    mask.bounding_box()
}

/// Document-space positions of every mask handle, in hit-test priority order.
pub fn mask_handle_positions(mask: &MaskObject, selection: &SelectionBox) -> [(Handle, Pos2); 9] {
    let b = mask.bounding_box();
    let mid_x = b.center().x;
    let mid_y = b.center().y;
    MASK_HANDLE_PRIORITY.map(|handle| {
        let local = match handle {
            Handle::Rotate => pos2(mid_x, b.min.y - ROTATE_HANDLE_OFFSET),
            Handle::NorthWest => b.left_top(),
            Handle::NorthEast => b.right_top(),
            Handle::SouthWest => b.left_bottom(),
            Handle::SouthEast => b.right_bottom(),
            Handle::North => pos2(mid_x, b.min.y),
            Handle::South => pos2(mid_x, b.max.y),
            Handle::East => pos2(b.max.x, mid_y),
            Handle::West => pos2(b.min.x, mid_y),
            Handle::Move => b.center(),
        };
        (handle, mask.local_to_document(local, selection))
    })
}

/// First mask handle within `15 / viewport_scale` of `p`, testing rotate,
/// then corners, then edges.
pub fn hit_test_mask_handles(
    p: Pos2,
    mask: &MaskObject,
    selection: &SelectionBox,
    viewport_scale: f32,
) -> Option<Handle> {
    let radius = MASK_HANDLE_RADIUS / viewport_scale;
    mask_handle_positions(mask, selection)
        .into_iter()
        .find(|(_, anchor)| p.distance(*anchor) < radius)
        .map(|(handle, _)| handle)
}

/// Handle of the staged layer placed at `layer` under `p`. Corners are
/// tested by distance, edges by a box around their midpoint, and anything
/// strictly inside the layer counts as a move grab.
pub fn hit_test_layer_handles(p: Pos2, layer: Rect, viewport_scale: f32) -> Option<Handle> {
    let r = LAYER_HANDLE_RADIUS / viewport_scale;
    let (l, t, rt, b) = (layer.min.x, layer.min.y, layer.max.x, layer.max.y);
    let (cx, cy) = (layer.center().x, layer.center().y);

    let corners = [
        (Handle::NorthWest, pos2(l, t)),
        (Handle::NorthEast, pos2(rt, t)),
        (Handle::SouthEast, pos2(rt, b)),
        (Handle::SouthWest, pos2(l, b)),
    ];
    if let Some((handle, _)) = corners.iter().find(|(_, c)| p.distance(*c) < r) {
        return Some(*handle);
    }

    let edges = [
        (Handle::North, pos2(cx, t)),
        (Handle::East, pos2(rt, cy)),
        (Handle::South, pos2(cx, b)),
        (Handle::West, pos2(l, cy)),
    ];
    if let Some((handle, _)) = edges
        .iter()
        .find(|(_, m)| (p.x - m.x).abs() < r && (p.y - m.y).abs() < r)
    {
        return Some(*handle);
    }

    if p.x > l && p.x < rt && p.y > t && p.y < b {
        return Some(Handle::Move);
    }
    None
}

/// True if `p` lies within `reach` document pixels of the layer rect.
pub fn within_reach(p: Pos2, layer: Rect, reach: f32) -> bool {
    layer.expand(reach).contains(p)
}
