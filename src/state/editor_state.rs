//! The interaction state machine for the canvas.
//!
//! Exactly one gesture is active at a time. Every gesture starts from `Idle`
//! on pointer-down and returns to `Idle` on pointer-up:
//!
//! ```text
//!               ┌──────────────────────┐
//!               │ Panning              │
//!               │ DrawingSelection     │
//! ┌──────┐ down │ PaintingMask         │ up  ┌──────┐
//! │ Idle ├─────►│ ErasingMasks         ├────►│ Idle │
//! └──────┘      │ TransformingMask     │     └──────┘
//!               │ TransformingLayer    │
//!               │ ErasingLayer         │
//!               └──────────────────────┘
//! ```
//!
//! Transitions are driven by `EditorContext`; gestures never chain into one
//! another without passing through `Idle`.

use egui::{Pos2, Rect};
use serde::{Deserialize, Serialize};

use crate::geometry::Handle;
use crate::mask::{MaskId, MaskTransform};
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditorState {
    #[default]
    Idle,
    /// Dragging the viewport; positions in screen space
    Panning { start: Pos2, initial: Viewport },
    /// Rubber-banding a new selection from `anchor` (document space)
    DrawingSelection { anchor: Pos2 },
    /// Accumulating a mask outline into the path buffer
    PaintingMask,
    /// Deleting every mask the pointer passes over
    ErasingMasks,
    /// Dragging a handle of a mask
    TransformingMask {
        id: MaskId,
        handle: Handle,
        start: Pos2,
        initial: MaskTransform,
    },
    /// Moving or resizing the staged layer
    TransformingLayer {
        handle: Handle,
        start: Pos2,
        initial: Rect,
    },
    /// Painting erasure into the staged layer's mask; `last` is the previous
    /// stamp position in layer image space
    ErasingLayer { last: Pos2 },
}

impl EditorState {
    /// Validates whether a transition to the new state is allowed
    pub fn can_transition_to(&self, new_state: &EditorState) -> bool {
        matches!((self, new_state), (EditorState::Idle, _) | (_, EditorState::Idle))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, EditorState::Idle)
    }

    pub fn is_panning(&self) -> bool {
        matches!(self, EditorState::Panning { .. })
    }

    /// The layer handle being dragged, if any
    pub fn active_layer_handle(&self) -> Option<Handle> {
        match self {
            EditorState::TransformingLayer { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    /// The mask and handle being dragged, if any
    pub fn active_mask_handle(&self) -> Option<(MaskId, Handle)> {
        match self {
            EditorState::TransformingMask { id, handle, .. } => Some((*id, *handle)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EditorState::Idle => "idle",
            EditorState::Panning { .. } => "panning",
            EditorState::DrawingSelection { .. } => "drawing-selection",
            EditorState::PaintingMask => "painting-mask",
            EditorState::ErasingMasks => "erasing-masks",
            EditorState::TransformingMask { .. } => "transforming-mask",
            EditorState::TransformingLayer { .. } => "transforming-layer",
            EditorState::ErasingLayer { .. } => "erasing-layer",
        }
    }
}

/// What a primary drag inside the selection does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawingMode {
    /// Drag draws a new selection
    #[default]
    None,
    /// Drag paints a mask outline; clicking a mask selects it
    Brush,
    /// Clicking or dragging over masks deletes them
    Eraser,
}

/// What a primary drag on the staged layer does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerTool {
    #[default]
    Move,
    Eraser,
}

/// Lifecycle of the staged layer as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StagedPhase {
    Empty,
    /// Fading in; `progress` in 0..1
    Revealing { progress: f32 },
    Editing,
    Erasing,
}
