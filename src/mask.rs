//! Polygonal cut-outs drawn inside the active selection. Each mask keeps its
//! outline untouched and carries an affine transform (translate, rotate,
//! non-uniform scale) about its own pivot.

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{self, Handle, SelectionBox, hit_testing};

pub type MaskId = Uuid;

/// Minimum number of path points for a stroke to become a mask
pub const MIN_MASK_POINTS: usize = 3;
/// Horizontal drag to rotation gain, radians per document pixel
pub const ROTATION_GAIN: f32 = 0.01;

const TRANSLATION_EPSILON: f32 = 0.1;
const ROTATION_EPSILON: f32 = 0.01;
const SCALE_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskTransform {
    /// Translation of the pivot, document pixels
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Radians
    pub rotation: f32,
}

impl MaskTransform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation: 0.0,
    };

    pub fn translation(&self) -> Vec2 {
        vec2(self.x, self.y)
    }

    /// True once the transform has moved measurably away from identity.
    pub fn is_transformed(&self) -> bool {
        self.x.abs() > TRANSLATION_EPSILON
            || self.y.abs() > TRANSLATION_EPSILON
            || self.rotation.abs() > ROTATION_EPSILON
            || (self.scale_x - 1.0).abs() > SCALE_EPSILON
            || (self.scale_y - 1.0).abs() > SCALE_EPSILON
    }
}

impl Default for MaskTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskObject {
    id: MaskId,
    /// Outline relative to `center`
    points: Vec<Pos2>,
    /// Pivot, relative to the selection's top-left corner
    center: Pos2,
    pub transform: MaskTransform,
}

impl MaskObject {
    /// Builds a mask from a stroke path given relative to the selection
    /// origin. The path's bounding-box centre becomes the pivot.
    pub fn from_path(path: &[Pos2]) -> Option<Self> {
        if path.len() < MIN_MASK_POINTS {
            return None;
        }
        let center = geometry::polygon_bounds(path).center();
        let points = path
            .iter()
            .map(|p| pos2(p.x - center.x, p.y - center.y))
            .collect();
        Some(Self {
            id: Uuid::new_v4(),
            points,
            center,
            transform: MaskTransform::IDENTITY,
        })
    }

    pub fn id(&self) -> MaskId {
        self.id
    }

    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    pub fn center(&self) -> Pos2 {
        self.center
    }

    pub fn is_transformed(&self) -> bool {
        self.transform.is_transformed()
    }

    /// Bounds of the untransformed outline, relative to the pivot.
    pub fn bounding_box(&self) -> Rect {
        geometry::polygon_bounds(&self.points)
    }

    /// Forward transform: pivot-relative outline point to document space.
    /// Scale, then rotate, then translate.
    pub fn local_to_document(&self, local: Pos2, selection: &SelectionBox) -> Pos2 {
        let t = &self.transform;
        let scaled = vec2(local.x * t.scale_x, local.y * t.scale_y);
        let rotated = geometry::rotate(scaled, t.rotation);
        selection.origin() + self.center.to_vec2() + t.translation() + rotated
    }

    /// Inverse of [`Self::local_to_document`].
    pub fn document_to_local(&self, p: Pos2, selection: &SelectionBox) -> Pos2 {
        let t = &self.transform;
        let rel = p - selection.origin() - self.center.to_vec2() - t.translation();
        let unrotated = geometry::rotate(rel, -t.rotation);
        pos2(unrotated.x / t.scale_x, unrotated.y / t.scale_y)
    }

    pub fn contains(&self, p: Pos2, selection: &SelectionBox) -> bool {
        hit_testing::point_in_mask_object(p, self, selection)
    }

    /// Outline at the untransformed position, in document space.
    pub fn original_outline(&self, selection: &SelectionBox) -> Vec<Pos2> {
        let offset = selection.origin().to_vec2() + self.center.to_vec2();
        self.points.iter().map(|p| *p + offset).collect()
    }

    /// Outline with the current transform applied, in document space.
    pub fn transformed_outline(&self, selection: &SelectionBox) -> Vec<Pos2> {
        self.points
            .iter()
            .map(|p| self.local_to_document(*p, selection))
            .collect()
    }

    /// Transform produced by dragging a resize handle to `pointer`, starting
    /// from `initial`. Extents are recomputed in the de-rotated local frame.
    /// A degenerate result (either side within 1px of zero) leaves `initial`
    /// unchanged.
    pub fn resized(
        &self,
        handle: Handle,
        pointer: Pos2,
        selection: &SelectionBox,
        initial: MaskTransform,
        symmetric: bool,
    ) -> MaskTransform {
        let bounds = self.bounding_box();
        let local_min = vec2(bounds.min.x * initial.scale_x, bounds.min.y * initial.scale_y);
        let local_max = vec2(bounds.max.x * initial.scale_x, bounds.max.y * initial.scale_y);
        let initial_size = local_max - local_min;

        let pivot = selection.origin() + self.center.to_vec2() + initial.translation();
        let m = geometry::rotate(pointer - pivot, -initial.rotation);

        let (mut min, mut max) = (local_min, local_max);
        if handle.touches_east() {
            max.x = if symmetric { m.x.abs() } else { m.x };
            if symmetric {
                min.x = -max.x;
            }
        }
        if handle.touches_west() {
            min.x = if symmetric { -m.x.abs() } else { m.x };
            if symmetric {
                max.x = -min.x;
            }
        }
        if handle.touches_south() {
            max.y = if symmetric { m.y.abs() } else { m.y };
            if symmetric {
                min.y = -max.y;
            }
        }
        if handle.touches_north() {
            min.y = if symmetric { -m.y.abs() } else { m.y };
            if symmetric {
                max.y = -min.y;
            }
        }

        if handle.is_corner() {
            let ratio = initial_size.x / initial_size.y;
            let target_h = (max.x - min.x) / ratio;
            if symmetric {
                min.y = -target_h / 2.0;
                max.y = target_h / 2.0;
            } else if handle.touches_north() {
                min.y = max.y - target_h;
            } else {
                max.y = min.y + target_h;
            }
        }

        let final_size = max - min;
        if final_size.x.abs() <= 1.0 || final_size.y.abs() <= 1.0 {
            return initial;
        }

        let centre_offset = geometry::rotate((min + max) / 2.0, initial.rotation);
        MaskTransform {
            x: initial.x + centre_offset.x,
            y: initial.y + centre_offset.y,
            scale_x: initial.scale_x * (final_size.x / initial_size.x),
            scale_y: initial.scale_y * (final_size.y / initial_size.y),
            rotation: initial.rotation,
        }
    }
}

/// The masks owned by the current selection, in creation order (last on top),
/// plus the single selected mask.
#[derive(Debug, Clone, Default)]
pub struct MaskSet {
    masks: Vec<MaskObject>,
    selected: Option<MaskId>,
    /// Bumped on every mutation; overlay caches key on it
    revision: u64,
}

impl MaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaskObject> {
        self.masks.iter()
    }

    pub fn as_slice(&self) -> &[MaskObject] {
        &self.masks
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: MaskId) -> Option<&MaskObject> {
        self.masks.iter().find(|m| m.id == id)
    }

    pub fn selected_id(&self) -> Option<MaskId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&MaskObject> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Commits a finished stroke path (relative to the selection origin).
    /// Returns the new mask's id, or `None` for degenerate paths.
    pub fn create_from_path(&mut self, path: &[Pos2]) -> Option<MaskId> {
        let mask = MaskObject::from_path(path)?;
        let id = mask.id;
        log::debug!("Created mask {} from {} points", id, path.len());
        self.masks.push(mask);
        self.revision += 1;
        Some(id)
    }

    /// Topmost mask whose transformed outline contains `p`.
    pub fn topmost_at(&self, p: Pos2, selection: &SelectionBox) -> Option<MaskId> {
        self.masks
            .iter()
            .rev()
            .find(|m| m.contains(p, selection))
            .map(|m| m.id)
    }

    /// Selects the topmost mask under `p`, or clears the selection if none.
    pub fn select_at(&mut self, p: Pos2, selection: &SelectionBox) -> Option<MaskId> {
        self.selected = self.topmost_at(p, selection);
        self.revision += 1;
        self.selected
    }

    pub fn select(&mut self, id: MaskId) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id);
            self.revision += 1;
            true
        } else {
            false
        }
    }

    pub fn deselect(&mut self) {
        if self.selected.take().is_some() {
            self.revision += 1;
        }
    }

    pub fn delete(&mut self, id: MaskId) -> bool {
        let before = self.masks.len();
        self.masks.retain(|m| m.id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.revision += 1;
        before != self.masks.len()
    }

    pub fn delete_selected(&mut self) -> bool {
        match self.selected {
            Some(id) => self.delete(id),
            None => false,
        }
    }

    /// Deletes the topmost mask under `p`.
    pub fn delete_at(&mut self, p: Pos2, selection: &SelectionBox) -> Option<MaskId> {
        let id = self.topmost_at(p, selection)?;
        self.delete(id);
        Some(id)
    }

    pub fn clear(&mut self) {
        self.masks.clear();
        self.selected = None;
        self.revision += 1;
    }

    /// True if any mask has been moved, rotated or scaled.
    pub fn has_transforms(&self) -> bool {
        self.masks.iter().any(MaskObject::is_transformed)
    }

    /// Updates mask `id` for a handle drag. `drag_delta` is the pointer
    /// travel since the drag started, `pointer` the current position; both
    /// in document space. Returns false if the mask no longer exists.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_transform_delta(
        &mut self,
        id: MaskId,
        handle: Handle,
        initial: MaskTransform,
        drag_delta: Vec2,
        pointer: Pos2,
        selection: &SelectionBox,
        symmetric: bool,
    ) -> bool {
        let Some(mask) = self.masks.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        mask.transform = match handle {
            Handle::Move => MaskTransform {
                x: initial.x + drag_delta.x,
                y: initial.y + drag_delta.y,
                ..initial
            },
            Handle::Rotate => MaskTransform {
                rotation: initial.rotation + drag_delta.x * ROTATION_GAIN,
                ..initial
            },
            _ => mask.resized(handle, pointer, selection, initial, symmetric),
        };
        self.revision += 1;
        true
    }
}
