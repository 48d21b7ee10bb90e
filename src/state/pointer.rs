use std::sync::Arc;

use egui::{PointerButton, Pos2, vec2};
use image::GrayImage;

use super::context::{EditorContext, PointerSample};
use super::editor_state::{DrawingMode, EditorState, LayerTool};
use crate::brush;
use crate::geometry::{self, Handle, SelectionBox, hit_testing};
use crate::layer;

impl EditorContext {
    /// Starts a gesture. Tested in order: pan, mask handles and masks
    /// inside the selection, the staged layer, then a new selection.
    pub fn pointer_down(&mut self, sample: PointerSample, button: PointerButton) {
        if !self.state.is_idle() || self.document.is_none() {
            return;
        }

        let pan = matches!(button, PointerButton::Secondary | PointerButton::Middle) || self.space_down;
        if pan {
            self.transition_to(EditorState::Panning {
                start: sample.screen,
                initial: self.viewport,
            });
            return;
        }
        if button != PointerButton::Primary || self.is_processing() {
            return;
        }

        let p = sample.document;
        let scale = self.viewport.scale;

        if let Some(selection) = self.selection.filter(|_| self.drawing_mode != DrawingMode::None) {
            if self.begin_mask_gesture(p, &selection) {
                return;
            }
        }

        if let Some(staged) = &self.staged {
            let rect = staged.rect();
            match self.layer_tool {
                LayerTool::Eraser => {
                    if hit_testing::within_reach(p, rect, self.config.layer_eraser_reach) {
                        self.begin_layer_erase(p);
                        return;
                    }
                }
                LayerTool::Move => {
                    if let Some(handle) = hit_testing::hit_test_layer_handles(p, rect, scale) {
                        self.transition_to(EditorState::TransformingLayer {
                            handle,
                            start: p,
                            initial: rect,
                        });
                        return;
                    }
                }
            }
            self.transition_to(EditorState::Panning {
                start: sample.screen,
                initial: self.viewport,
            });
            return;
        }

        if self.drawing_mode == DrawingMode::None {
            let size = self.document_size();
            let anchor = geometry::clamp_to_size(p, size.x, size.y);
            self.selection = Some(SelectionBox::new(anchor.x, anchor.y, 0.0, 0.0));
            self.transition_to(EditorState::DrawingSelection { anchor });
        }
    }

    /// Mask-mode press inside a selection. Returns false when the press
    /// should fall through to the staged layer.
    fn begin_mask_gesture(&mut self, p: Pos2, selection: &SelectionBox) -> bool {
        let scale = self.viewport.scale;
        let handle_hit = self.masks.selected().and_then(|mask| {
            hit_testing::hit_test_mask_handles(p, mask, selection, scale)
                .map(|handle| (mask.id(), handle, mask.transform))
        });
        if let Some((id, handle, initial)) = handle_hit {
            self.transition_to(EditorState::TransformingMask {
                id,
                handle,
                start: p,
                initial,
            });
            return true;
        }

        let clicked = self.masks.topmost_at(p, selection);
        if self.drawing_mode == DrawingMode::Eraser {
            if let Some(id) = clicked {
                self.masks.delete(id);
            }
            self.transition_to(EditorState::ErasingMasks);
            return true;
        }

        let clicked = clicked.and_then(|id| self.masks.get(id).map(|m| (id, m.transform)));
        if let Some((id, initial)) = clicked {
            self.masks.select(id);
            self.transition_to(EditorState::TransformingMask {
                id,
                handle: Handle::Move,
                start: p,
                initial,
            });
            return true;
        }

        if selection.contains(p) {
            self.masks.deselect();
            self.path.begin(p - selection.origin().to_vec2());
            self.transition_to(EditorState::PaintingMask);
            return true;
        }
        false
    }

    /// Continues the active gesture, or refreshes hover state when idle.
    pub fn pointer_move(&mut self, sample: PointerSample) {
        self.hover.screen = Some(sample.screen);
        let p = sample.document;

        match self.state.clone() {
            EditorState::Idle => self.update_hover(p),
            EditorState::Panning { start, initial } => {
                self.viewport = initial.panned(sample.screen - start);
            }
            EditorState::DrawingSelection { anchor } => {
                let size = self.document_size();
                let current = geometry::clamp_to_size(p, size.x, size.y);
                self.selection = Some(SelectionBox::from_corners(anchor, current));
            }
            EditorState::PaintingMask => {
                if let Some(selection) = self.selection {
                    self.path.push(p - selection.origin().to_vec2());
                }
            }
            EditorState::ErasingMasks => {
                if let Some(selection) = self.selection {
                    self.masks.delete_at(p, &selection);
                }
            }
            EditorState::TransformingMask {
                id,
                handle,
                start,
                initial,
            } => {
                if let Some(selection) = self.selection {
                    self.masks.apply_transform_delta(
                        id,
                        handle,
                        initial,
                        p - start,
                        p,
                        &selection,
                        sample.symmetric(),
                    );
                }
            }
            EditorState::TransformingLayer {
                handle,
                start,
                initial,
            } => {
                let rect = layer::resize_layer_rect(handle, initial, p - start, sample.symmetric());
                if let Some(staged) = &mut self.staged {
                    staged.set_rect(rect);
                }
            }
            EditorState::ErasingLayer { last } => {
                if let Some(next) = self.stamp_erase(Some(last), p) {
                    self.state = EditorState::ErasingLayer { last: next };
                }
            }
        }
    }

    /// Ends the active gesture and records its result.
    pub fn pointer_up(&mut self, sample: PointerSample) {
        let finished = std::mem::take(&mut self.state);
        match finished {
            EditorState::Idle => {}
            EditorState::Panning { start, initial } => {
                self.viewport = initial.panned(sample.screen - start);
            }
            EditorState::ErasingLayer { .. } => {
                if let Some(staged) = &mut self.staged {
                    staged.mask_image = self.erase_buffer.take().map(Arc::new);
                }
                self.push_layer_history();
            }
            EditorState::PaintingMask => {
                let points = self.path.take();
                if self.drawing_mode == DrawingMode::Brush && self.masks.create_from_path(&points).is_none() {
                    log::debug!("Discarded mask stroke with {} points", points.len());
                }
            }
            EditorState::TransformingLayer { initial, .. } => {
                if self.staged.as_ref().is_some_and(|s| s.moved_from(initial)) {
                    self.push_layer_history();
                }
            }
            EditorState::DrawingSelection { .. } => {
                self.masks.clear();
            }
            EditorState::ErasingMasks | EditorState::TransformingMask { .. } => {}
        }
        self.path.clear();

        if self
            .selection
            .is_some_and(|s| s.is_smaller_than(self.config.min_selection_size))
        {
            log::debug!("Discarded undersized selection");
            self.reset_selection();
        }
    }

    /// Pointer left the canvas.
    pub fn pointer_leave(&mut self) {
        self.hover = Default::default();
    }

    fn update_hover(&mut self, p: Pos2) {
        if self.is_processing() {
            return;
        }
        let scale = self.viewport.scale;
        self.hover.layer_handle = match (&self.staged, self.layer_tool) {
            (Some(staged), LayerTool::Move) => hit_testing::hit_test_layer_handles(p, staged.rect(), scale),
            _ => None,
        };

        let Some(selection) = self.selection.filter(|_| !self.masks.is_empty()) else {
            self.hover.mask = None;
            self.hover.mask_handle = None;
            return;
        };
        self.hover.mask_handle = self
            .masks
            .selected()
            .and_then(|m| hit_testing::hit_test_mask_handles(p, m, &selection, scale));
        if self.hover.mask_handle.is_some() {
            return;
        }
        self.hover.mask = self.masks.topmost_at(p, &selection);
    }

    fn begin_layer_erase(&mut self, p: Pos2) {
        let Some(staged) = &self.staged else {
            return;
        };
        let (w, h) = staged.image.dimensions();
        let buffer = match &staged.mask_image {
            Some(mask) if mask.dimensions() == (w, h) => GrayImage::clone(mask),
            _ => GrayImage::new(w, h),
        };
        self.erase_buffer = Some(buffer);
        self.state = EditorState::ErasingLayer { last: Pos2::ZERO };
        match self.stamp_erase(None, p) {
            Some(last) => self.state = EditorState::ErasingLayer { last },
            None => {
                self.erase_buffer = None;
                self.state = EditorState::Idle;
            }
        }
    }

    /// Stamps the eraser from `from` (layer image space) to the document
    /// point `to`. Returns the new stamp position in image space.
    fn stamp_erase(&mut self, from: Option<Pos2>, to: Pos2) -> Option<Pos2> {
        let staged = self.staged.as_ref()?;
        let buffer = self.erase_buffer.as_mut()?;
        let radius = brush::brush_radius_in_image(
            self.eraser.size,
            self.viewport.scale,
            staged.image_size(),
            vec2(staged.width, staged.height),
        );
        let kernel = self.brush_cache.kernel(radius, self.eraser.softness);
        let at = staged.to_image_space(to);
        Some(brush::stamp_segment(buffer, kernel, from, at))
    }
}
