//! The editing session: document, viewport, selection, masks and the staged
//! layer, plus every operation the UI can invoke on them.
//!
//! `EditorContext` owns all mutable editor state. Pointer gestures live in
//! `state::pointer`; this file holds lifecycle operations (import,
//! generation, commit, undo) and keyboard handling.

use std::sync::Arc;

use egui::{CursorIcon, Key, Modifiers, Pos2, Rect, Vec2, vec2};
use image::{GrayImage, RgbaImage};

use super::editor_state::{DrawingMode, EditorState, LayerTool, StagedPhase};
use super::persistence::HistorySnapshot;
use crate::brush::BrushCache;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::GenerationError;
use crate::geometry::{Handle, SelectionBox};
use crate::history::History;
use crate::layer::{LayerCompositor, StagedLayer};
use crate::mask::{MaskId, MaskSet};
use crate::raster;
use crate::request::{self, RegionRequest};
use crate::service::Regenerator;
use crate::stroke::PathBuffer;
use crate::util::time;
use crate::viewport::Viewport;

/// How long after a nudge the layer's dashed border stays hidden
pub const NUDGE_BORDER_SUPPRESS_MS: f64 = 1000.0;
/// Upper bound of the feather slider
pub const MAX_FEATHER: f32 = 100.0;

/// Layer eraser brush, as shown in the toolbar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EraserSettings {
    /// Diameter in screen pixels
    pub size: f32,
    /// 0 is a hard edge, 100 fully soft
    pub softness: f32,
}

/// One pointer position in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub screen: Pos2,
    pub document: Pos2,
    pub modifiers: Modifiers,
}

impl PointerSample {
    /// A sample for an unpanned, unzoomed viewport at the canvas origin,
    /// where screen and document coordinates coincide.
    pub fn at(document: Pos2) -> Self {
        Self {
            screen: document,
            document,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Ctrl (or Cmd on macOS) resizes symmetrically about the centre.
    pub fn symmetric(&self) -> bool {
        self.modifiers.ctrl || self.modifiers.command
    }
}

/// What sits under the idle pointer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct Hover {
    pub screen: Option<Pos2>,
    pub layer_handle: Option<Handle>,
    pub mask_handle: Option<Handle>,
    pub mask: Option<MaskId>,
}

#[derive(Debug)]
pub struct EditorContext {
    pub(super) config: EditorConfig,
    pub(super) state: EditorState,
    pub(super) document: Option<Document>,
    pub(super) viewport: Viewport,
    pub(super) selection: Option<SelectionBox>,
    pub(super) masks: MaskSet,
    pub(super) path: PathBuffer,
    pub(super) drawing_mode: DrawingMode,
    pub(super) layer_tool: LayerTool,
    pub(super) staged: Option<StagedLayer>,
    pub(super) layer_history: History<StagedLayer>,
    pub(super) compositor: LayerCompositor,
    /// Live erasure mask while an erase stroke is in progress
    pub(super) erase_buffer: Option<GrayImage>,
    pub(super) brush_cache: BrushCache,
    pub(super) eraser: EraserSettings,
    /// Selection snapshot of the request in flight
    pub(super) processing: Option<SelectionBox>,
    pub(super) reference_images: Vec<Arc<RgbaImage>>,
    pub(super) space_down: bool,
    pub(super) adjusting_feather: bool,
    pub(super) last_nudge_ms: Option<f64>,
    pub(super) hover: Hover,
    pub(super) last_error: Option<GenerationError>,
}

impl Default for EditorContext {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorContext {
    pub fn new(config: EditorConfig) -> Self {
        let eraser = EraserSettings {
            size: config.eraser_size,
            softness: config.eraser_softness,
        };
        Self {
            config,
            state: EditorState::Idle,
            document: None,
            viewport: Viewport::default(),
            selection: None,
            masks: MaskSet::new(),
            path: PathBuffer::new(),
            drawing_mode: DrawingMode::None,
            layer_tool: LayerTool::Move,
            staged: None,
            layer_history: History::new(),
            compositor: LayerCompositor::new(),
            erase_buffer: None,
            brush_cache: BrushCache::new(),
            eraser,
            processing: None,
            reference_images: Vec::new(),
            space_down: false,
            adjusting_feather: false,
            last_nudge_ms: None,
            hover: Hover::default(),
            last_error: None,
        }
    }

    /// Starts a context already holding `document`.
    pub fn with_document(config: EditorConfig, document: Document) -> Self {
        let mut ctx = Self::new(config);
        ctx.load_document(document);
        ctx
    }

    // ---- accessors ----

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn current_state(&self) -> &EditorState {
        &self.state
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn selection(&self) -> Option<&SelectionBox> {
        self.selection.as_ref()
    }

    pub fn masks(&self) -> &MaskSet {
        &self.masks
    }

    pub fn path(&self) -> &PathBuffer {
        &self.path
    }

    pub fn drawing_mode(&self) -> DrawingMode {
        self.drawing_mode
    }

    pub fn layer_tool(&self) -> LayerTool {
        self.layer_tool
    }

    pub fn staged_layer(&self) -> Option<&StagedLayer> {
        self.staged.as_ref()
    }

    pub fn layer_history(&self) -> &History<StagedLayer> {
        &self.layer_history
    }

    pub fn eraser(&self) -> EraserSettings {
        self.eraser
    }

    pub fn processing_region(&self) -> Option<&SelectionBox> {
        self.processing.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_some()
    }

    pub fn reference_images(&self) -> &[Arc<RgbaImage>] {
        &self.reference_images
    }

    pub fn is_adjusting_feather(&self) -> bool {
        self.adjusting_feather
    }

    pub fn is_space_down(&self) -> bool {
        self.space_down
    }

    pub fn last_error(&self) -> Option<&GenerationError> {
        self.last_error.as_ref()
    }

    /// Hands the pending error to the UI once.
    pub fn take_last_error(&mut self) -> Option<GenerationError> {
        self.last_error.take()
    }

    pub fn hovered_mask(&self) -> Option<MaskId> {
        self.hover.mask
    }

    pub fn hovered_layer_handle(&self) -> Option<Handle> {
        self.hover.layer_handle
    }

    pub fn hovered_mask_handle(&self) -> Option<Handle> {
        self.hover.mask_handle
    }

    /// Last known pointer position on screen, if the pointer is over the
    /// canvas.
    pub fn pointer_screen_pos(&self) -> Option<Pos2> {
        self.hover.screen
    }

    /// Document size in pixels, or zero with no document loaded.
    pub fn document_size(&self) -> Vec2 {
        self.document.as_ref().map(Document::size).unwrap_or(Vec2::ZERO)
    }

    /// Converts a screen position over `canvas` into a pointer sample.
    pub fn sample(&self, screen: Pos2, canvas: Rect, modifiers: Modifiers) -> PointerSample {
        PointerSample {
            screen,
            document: self.viewport.screen_to_document(screen, canvas, self.document_size()),
            modifiers,
        }
    }

    pub(super) fn transition_to(&mut self, new_state: EditorState) {
        if !self.state.can_transition_to(&new_state) {
            log::debug!(
                "Ignoring transition {} -> {}",
                self.state.name(),
                new_state.name()
            );
            return;
        }
        if self.state != new_state {
            log::debug!("Editor state {} -> {}", self.state.name(), new_state.name());
        }
        self.state = new_state;
    }

    // ---- document lifecycle ----

    /// Replaces the current document and resets all per-document state.
    pub fn load_document(&mut self, document: Document) {
        log::info!("Loaded {}x{} document", document.width(), document.height());
        self.document = Some(document);
        self.state = EditorState::Idle;
        self.reset_selection();
        self.discard_staged_layer();
        self.reference_images.clear();
        self.processing = None;
        self.last_error = None;
    }

    /// Fits the viewport to a container of the given width.
    pub fn fit_to_width(&mut self, container_width: f32) {
        self.viewport = Viewport::fit(container_width, self.document_size());
    }

    /// Wheel zoom around `anchor`, a canvas-relative screen position.
    pub fn zoom(&mut self, anchor: Pos2, delta_y: f32) {
        self.viewport.zoom_at(anchor, delta_y, &self.config);
    }

    pub fn undo(&mut self) -> bool {
        if self.is_processing() {
            return false;
        }
        let changed = self.document.as_mut().is_some_and(Document::undo);
        if changed {
            self.after_document_step();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        if self.is_processing() {
            return false;
        }
        let changed = self.document.as_mut().is_some_and(Document::redo);
        if changed {
            self.after_document_step();
        }
        changed
    }

    pub fn can_undo(&self) -> bool {
        !self.is_processing() && self.document.as_ref().is_some_and(Document::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        !self.is_processing() && self.document.as_ref().is_some_and(Document::can_redo)
    }

    /// Stepping through document history discards everything layered on
    /// top of the old base.
    fn after_document_step(&mut self) {
        self.state = EditorState::Idle;
        self.discard_staged_layer();
        self.reset_selection();
        self.reference_images.clear();
    }

    // ---- selection and tools ----

    /// Replaces the selection with `selection`, dropping its masks.
    /// Refused while a request is in flight.
    pub fn select_region(&mut self, selection: SelectionBox) -> bool {
        if self.is_processing() {
            log::debug!("Selection locked while processing");
            return false;
        }
        self.selection = Some(selection);
        self.masks.clear();
        self.path.clear();
        true
    }

    /// Drops the selection and its masks. Refused while a request is in
    /// flight.
    pub fn clear_selection(&mut self) -> bool {
        if self.is_processing() {
            log::debug!("Selection locked while processing");
            return false;
        }
        self.reset_selection();
        true
    }

    pub(super) fn reset_selection(&mut self) {
        self.selection = None;
        self.drawing_mode = DrawingMode::None;
        self.masks.clear();
        self.path.clear();
    }

    /// Switches what a drag inside the selection does. Mask modes need a
    /// selection. Returns whether the mode changed.
    pub fn set_drawing_mode(&mut self, mode: DrawingMode) -> bool {
        if self.is_processing() {
            return false;
        }
        if mode != DrawingMode::None && self.selection.is_none() {
            return false;
        }
        if mode == DrawingMode::None {
            self.masks.deselect();
        }
        let changed = self.drawing_mode != mode;
        self.drawing_mode = mode;
        changed
    }

    pub fn set_layer_tool(&mut self, tool: LayerTool) {
        self.layer_tool = tool;
    }

    pub fn set_eraser(&mut self, settings: EraserSettings) {
        self.eraser = EraserSettings {
            size: settings.size.max(1.0),
            softness: settings.softness.clamp(0.0, 100.0),
        };
    }

    /// Deletes the selected mask. Returns whether one was deleted.
    pub fn delete_selected_mask(&mut self) -> bool {
        !self.is_processing() && self.masks.delete_selected()
    }

    /// Attaches a style reference to the next request. Needs a selection
    /// and no request in flight.
    pub fn add_reference_image(&mut self, image: RgbaImage) -> bool {
        if self.is_processing() {
            log::warn!("Ignoring reference image: a request is in flight");
            return false;
        }
        if self.selection.is_none() {
            log::warn!("Ignoring reference image: draw a selection first");
            return false;
        }
        self.reference_images.push(Arc::new(image));
        true
    }

    pub fn remove_reference_image(&mut self, index: usize) {
        if index < self.reference_images.len() && !self.is_processing() {
            self.reference_images.remove(index);
        }
    }

    // ---- generation ----

    /// True if `generate` would build a request for `prompt`.
    pub fn can_generate(&self, prompt: &str) -> bool {
        self.document.is_some()
            && self.selection.is_some()
            && !self.is_processing()
            && request::can_generate(prompt, self.masks.has_transforms())
    }

    /// Snapshots the request for the current selection and marks the region
    /// as processing. Returns `None` when there is nothing to generate.
    pub fn begin_generation(&mut self, prompt: &str) -> Option<RegionRequest> {
        if self.is_processing() {
            log::debug!("Generation already in flight");
            return None;
        }
        let document = self.document.as_ref()?;
        let selection = self.selection?;
        let raster = document.current()?;
        let request = request::build_region_request(
            raster,
            &selection,
            self.masks.as_slice(),
            prompt,
            &self.reference_images,
        )?;

        log::info!("Generating {:?} region {:?}", request.mode, selection);
        self.state = EditorState::Idle;
        self.path.clear();
        self.processing = Some(selection);
        self.last_error = None;
        Some(request)
    }

    /// Applies the outcome of the request started by `begin_generation`.
    /// Success stages the image over the processed region; failure leaves
    /// the selection, masks and document untouched.
    pub fn finish_generation(
        &mut self,
        result: Result<RgbaImage, GenerationError>,
        now_ms: f64,
    ) -> Result<(), GenerationError> {
        let Some(region) = self.processing.take() else {
            return Err(GenerationError::InvalidResponse(
                "result arrived with no request in flight".into(),
            ));
        };

        let outcome = result.and_then(|image| {
            if image.width() == 0 || image.height() == 0 {
                return Err(GenerationError::InvalidResponse("empty image".into()));
            }
            if self.document.is_none() {
                return Err(GenerationError::NoDocument);
            }
            Ok(image)
        });

        let image = match outcome {
            Ok(image) => image,
            Err(e) => {
                log::error!("Generation failed: {e}");
                self.last_error = Some(e.clone());
                return Err(e);
            }
        };

        log::info!("Staging {}x{} result", image.width(), image.height());
        let layer = StagedLayer::from_generation(image, &region, self.config.default_feather, now_ms);
        self.layer_history.reset(layer.clone());
        self.staged = Some(layer);
        self.erase_buffer = None;
        self.compositor.invalidate();
        self.layer_tool = LayerTool::Move;
        self.reference_images.clear();
        self.reset_selection();
        Ok(())
    }

    /// Runs a whole generation against `service` on the current task.
    /// Returns `Ok(false)` when there was nothing to generate.
    pub async fn generate<R: Regenerator + ?Sized>(
        &mut self,
        service: &R,
        prompt: &str,
    ) -> Result<bool, GenerationError> {
        let Some(request) = self.begin_generation(prompt) else {
            return Ok(false);
        };
        let result = service.generate_edit(request).await;
        self.finish_generation(result, time::now_millis())?;
        Ok(true)
    }

    // ---- staged layer ----

    pub fn staged_phase(&self, now_ms: f64) -> StagedPhase {
        let Some(layer) = &self.staged else {
            return StagedPhase::Empty;
        };
        if matches!(self.state, EditorState::ErasingLayer { .. }) {
            return StagedPhase::Erasing;
        }
        let reveal = layer.reveal(now_ms, self.config.reveal_duration_ms);
        if reveal.is_animating() {
            StagedPhase::Revealing {
                progress: reveal.progress,
            }
        } else {
            StagedPhase::Editing
        }
    }

    /// The staged layer's composite and its cache version. Reflects the
    /// live erase buffer while a stroke is in progress.
    pub fn staged_composite(&mut self) -> Option<(Arc<RgbaImage>, u64)> {
        let layer = self.staged.as_ref()?;
        let live = match self.state {
            EditorState::ErasingLayer { .. } => self.erase_buffer.as_ref(),
            _ => None,
        };
        let composite = self.compositor.composite(layer, live);
        Some((composite, self.compositor.version()))
    }

    /// Flattens the document and the staged layer into one raster.
    pub fn export_composite(&mut self) -> Option<RgbaImage> {
        let mut flat = RgbaImage::clone(self.document.as_ref()?.current()?);
        let placement = self.staged.as_ref().map(|l| (l.x.round() as i64, l.y.round() as i64));
        if let (Some((composite, _)), Some((x, y))) = (self.staged_composite(), placement) {
            raster::blend_over(&mut flat, &composite, x, y, 1.0);
        }
        Some(flat)
    }

    /// Bakes the staged layer into the document as a new history entry.
    pub fn commit_layer(&mut self) -> bool {
        if self.staged.is_none() || self.is_processing() {
            return false;
        }
        let Some(flat) = self.export_composite() else {
            return false;
        };
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        if let Err(e) = document.commit(flat) {
            log::error!("Failed to commit staged layer: {e}");
            return false;
        }
        log::info!("Committed staged layer");
        self.discard_staged_layer();
        true
    }

    /// Throws the staged layer away without touching the document.
    pub fn cancel_layer(&mut self) -> bool {
        if self.staged.is_none() {
            return false;
        }
        log::info!("Cancelled staged layer");
        self.discard_staged_layer();
        true
    }

    fn discard_staged_layer(&mut self) {
        if matches!(
            self.state,
            EditorState::ErasingLayer { .. } | EditorState::TransformingLayer { .. }
        ) {
            self.state = EditorState::Idle;
        }
        self.staged = None;
        self.layer_history.clear();
        self.erase_buffer = None;
        self.compositor.invalidate();
        self.adjusting_feather = false;
    }

    pub(super) fn push_layer_history(&mut self) {
        if let Some(layer) = &self.staged {
            self.layer_history.push(layer.clone());
            log::debug!(
                "Layer history {} of {}",
                self.layer_history.cursor() + 1,
                self.layer_history.len()
            );
        }
    }

    pub fn undo_layer(&mut self) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        match self.layer_history.undo() {
            Some(layer) => {
                self.staged = Some(layer.clone());
                self.erase_buffer = None;
                true
            }
            None => false,
        }
    }

    pub fn redo_layer(&mut self) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        match self.layer_history.redo() {
            Some(layer) => {
                self.staged = Some(layer.clone());
                self.erase_buffer = None;
                true
            }
            None => false,
        }
    }

    /// Starts a feather slider drag; layer chrome is hidden meanwhile.
    pub fn begin_feather_adjust(&mut self) {
        if self.staged.is_some() {
            self.adjusting_feather = true;
        }
    }

    /// Live feather update while the slider moves.
    pub fn set_feather(&mut self, feather: f32) {
        if let Some(layer) = &mut self.staged {
            layer.feather = feather.clamp(0.0, MAX_FEATHER);
        }
    }

    /// Ends the slider drag and records the result.
    pub fn end_feather_adjust(&mut self) {
        if !self.adjusting_feather {
            return;
        }
        self.adjusting_feather = false;
        self.push_layer_history();
    }

    /// Moves the staged layer by `delta` document pixels.
    pub fn nudge(&mut self, delta: Vec2, now_ms: f64) -> bool {
        if self.is_processing() || !self.state.is_idle() {
            return false;
        }
        let Some(layer) = &mut self.staged else {
            return false;
        };
        layer.x += delta.x;
        layer.y += delta.y;
        self.last_nudge_ms = Some(now_ms);
        self.push_layer_history();
        true
    }

    /// True while the dashed layer border is hidden after a nudge.
    pub fn recently_nudged(&self, now_ms: f64) -> bool {
        self.last_nudge_ms
            .is_some_and(|t| time::elapsed_since(t, now_ms) < NUDGE_BORDER_SUPPRESS_MS)
    }

    // ---- keyboard ----

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers, now_ms: f64) {
        let step = if modifiers.shift {
            self.config.nudge_step_large
        } else {
            self.config.nudge_step
        };
        match key {
            Key::Space => self.space_down = true,
            Key::Delete | Key::Backspace => {
                if self.delete_selected_mask() {
                    log::debug!("Deleted selected mask");
                }
            }
            Key::ArrowUp => {
                self.nudge(vec2(0.0, -step), now_ms);
            }
            Key::ArrowDown => {
                self.nudge(vec2(0.0, step), now_ms);
            }
            Key::ArrowLeft => {
                self.nudge(vec2(-step, 0.0), now_ms);
            }
            Key::ArrowRight => {
                self.nudge(vec2(step, 0.0), now_ms);
            }
            _ => {}
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if key == Key::Space {
            self.space_down = false;
            if self.state.is_panning() {
                self.transition_to(EditorState::Idle);
            }
        }
    }

    // ---- cursor ----

    /// The pointer icon for the current state and hover target. `None`
    /// hides the system cursor so the eraser outline can stand in for it.
    pub fn cursor(&self) -> CursorIcon {
        let mask_rotation = |id: MaskId| self.masks.get(id).map_or(0.0, |m| m.transform.rotation);

        if self.is_processing() {
            return CursorIcon::Wait;
        }
        if self.state.is_panning() {
            return CursorIcon::Grabbing;
        }
        if self.space_down {
            return CursorIcon::Grab;
        }
        if let Some((id, handle)) = self.state.active_mask_handle() {
            return handle.cursor_icon(mask_rotation(id));
        }
        let drawing_mask = matches!(self.state, EditorState::PaintingMask | EditorState::ErasingMasks);
        if drawing_mask && self.masks.selected_id().is_none() {
            return CursorIcon::Crosshair;
        }
        if self.selection.is_some() {
            if let (Some(id), Some(handle)) = (self.masks.selected_id(), self.hover.mask_handle) {
                return handle.cursor_icon(mask_rotation(id));
            }
            if !drawing_mask {
                return if self.hover.mask.is_some() {
                    CursorIcon::Move
                } else {
                    CursorIcon::Crosshair
                };
            }
        }
        if self.staged.is_some() {
            if self.layer_tool == LayerTool::Eraser {
                return CursorIcon::None;
            }
            return match self.state.active_layer_handle().or(self.hover.layer_handle) {
                Some(handle) => handle.cursor_icon(0.0),
                None => CursorIcon::Grab,
            };
        }
        CursorIcon::Crosshair
    }

    /// Screen-space diameter of the eraser outline to draw at the pointer,
    /// when the layer eraser is active.
    pub fn eraser_outline(&self) -> Option<(Pos2, f32)> {
        let show = self.staged.is_some()
            && self.layer_tool == LayerTool::Eraser
            && !self.is_processing()
            && !self.state.is_panning()
            && self.state.active_layer_handle().is_none();
        if !show {
            return None;
        }
        self.hover.screen.map(|p| (p, self.eraser.size))
    }

    // ---- persistence ----

    /// Cheap snapshot of the document history for autosave.
    pub fn history_snapshot(&self) -> Option<HistorySnapshot> {
        self.document.as_ref().map(HistorySnapshot::capture)
    }
}
