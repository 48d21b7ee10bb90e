use std::sync::Arc;

use futures::future::BoxFuture;
use image::RgbaImage;
use parking_lot::Mutex;

use crate::config::EditorConfig;
use crate::error::GenerationError;
use crate::file_handler::{DropOutcome, FileHandler};
use crate::input::{InputEvent, InputHandler};
use crate::panels::{central_panel, tools_panel};
use crate::renderer::Renderer;
use crate::service::{PassthroughRegenerator, Regenerator};
use crate::state::{Autosave, EditorContext, MemoryProjectStore, ProjectStore};
use crate::util::time;
use crate::viewport::Viewport;

/// How long an error toast stays on screen
const TOAST_DURATION_MS: f64 = 4000.0;

/// Result slot shared with the task running a generation request
type PendingResult = Arc<Mutex<Option<Result<RgbaImage, GenerationError>>>>;

/// What survives a restart. Documents are kept by the project store.
#[derive(serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
struct AppSettings {
    config: EditorConfig,
    viewport: Option<Viewport>,
}

/// Runs `future` to completion without blocking the UI thread.
fn spawn_detached(future: BoxFuture<'static, ()>) {
    #[cfg(not(target_arch = "wasm32"))]
    std::thread::spawn(move || futures::executor::block_on(future));

    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(future);
}

pub struct PaintApp {
    editor: EditorContext,
    renderer: Renderer,
    input_handler: InputHandler,
    file_handler: FileHandler,
    service: Arc<dyn Regenerator>,
    store: Arc<dyn ProjectStore>,
    autosave: Autosave,
    pending: PendingResult,
    prompt: String,
    toast: Option<(String, f64)>,
    /// Viewport restored from storage, applied to the first document
    restored_viewport: Option<Viewport>,
    needs_fit: bool,
}

impl Default for PaintApp {
    fn default() -> Self {
        Self::with_settings(AppSettings::default())
    }
}

impl PaintApp {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings: AppSettings = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_default();
        Self::with_settings(settings)
    }

    fn with_settings(settings: AppSettings) -> Self {
        let config = match settings.config.validate() {
            Ok(()) => settings.config,
            Err(e) => {
                log::warn!("Stored config rejected, using defaults: {e}");
                EditorConfig::default()
            }
        };
        let autosave = Autosave::new(config.autosave_debounce_ms, time::now_millis());
        Self {
            editor: EditorContext::new(config),
            renderer: Renderer::new(),
            input_handler: InputHandler::new(),
            file_handler: FileHandler::new(),
            service: Arc::new(PassthroughRegenerator),
            store: Arc::new(MemoryProjectStore::new()),
            autosave,
            pending: Arc::new(Mutex::new(None)),
            prompt: String::new(),
            toast: None,
            restored_viewport: settings.viewport,
            needs_fit: false,
        }
    }

    /// Swaps in the regeneration backend.
    pub fn with_service(mut self, service: Arc<dyn Regenerator>) -> Self {
        self.service = service;
        self
    }

    /// Swaps in the project store used by autosave.
    pub fn with_store(mut self, store: Arc<dyn ProjectStore>) -> Self {
        self.store = store;
        self
    }

    pub fn editor(&self) -> &EditorContext {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut EditorContext {
        &mut self.editor
    }

    pub fn prompt_mut(&mut self) -> &mut String {
        &mut self.prompt
    }

    pub fn can_generate(&self) -> bool {
        self.editor.can_generate(&self.prompt)
    }

    pub fn set_tools_panel_rect(&mut self, rect: egui::Rect) {
        self.input_handler.set_tools_panel_rect(rect);
    }

    pub fn set_central_panel_rect(&mut self, rect: egui::Rect) {
        self.input_handler.set_central_panel_rect(rect);
    }

    /// Submits the current selection to the regeneration service. The
    /// result is picked up by a later frame.
    pub fn start_generation(&mut self) {
        let Some(request) = self.editor.begin_generation(&self.prompt) else {
            return;
        };
        let future = self.service.generate_edit(request);
        let slot = self.pending.clone();
        spawn_detached(Box::pin(async move {
            let result = future.await;
            *slot.lock() = Some(result);
        }));
    }

    fn poll_generation(&mut self, now_ms: f64) {
        let result = self.pending.lock().take();
        if let Some(result) = result {
            match self.editor.finish_generation(result, now_ms) {
                Ok(()) => self.prompt.clear(),
                // A failed request reports through `last_error`; anything else
                // is a stale result, e.g. for a document that has been replaced.
                Err(e) if self.editor.last_error().is_none() => {
                    log::debug!("Discarded generation result: {e}");
                }
                Err(_) => {}
            }
        }
        if let Some(error) = self.editor.take_last_error() {
            self.toast = Some((format!("Generation failed: {error}"), now_ms));
        }
    }

    fn poll_autosave(&mut self, now_ms: f64) {
        let Some(project) = self.autosave.poll(self.editor.document(), now_ms) else {
            return;
        };
        let save = self.store.save(project);
        spawn_detached(Box::pin(async move {
            if let Err(e) = save.await {
                log::error!("Autosave failed: {e}");
            }
        }));
    }

    /// Flattened document plus staged layer, encoded as PNG.
    pub fn export_png(&mut self) -> Option<Vec<u8>> {
        let flat = self.editor.export_composite()?;
        let mut bytes = Vec::new();
        let encoded = image::DynamicImage::ImageRgba8(flat)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png);
        match encoded {
            Ok(()) => Some(bytes),
            Err(e) => {
                log::error!("Export failed: {e}");
                None
            }
        }
    }

    /// Writes the export next to the working directory.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn export_to_disk(&mut self) {
        let Some(bytes) = self.export_png() else {
            return;
        };
        let path = format!("region-paint-{}.png", time::now_millis() as u64);
        match std::fs::write(&path, bytes) {
            Ok(()) => log::info!("Exported {path}"),
            Err(e) => log::error!("Failed to write {path}: {e}"),
        }
    }

    /// Fits a newly loaded document to the canvas width.
    pub fn fit_if_needed(&mut self, canvas_width: f32) {
        if !self.needs_fit {
            return;
        }
        self.needs_fit = false;
        match self.restored_viewport.take() {
            Some(viewport) => self.editor.set_viewport(viewport),
            None => self.editor.fit_to_width(canvas_width),
        }
    }

    /// Feeds this frame's canvas input to the editor.
    pub fn handle_input(&mut self, ctx: &egui::Context, canvas: egui::Rect) {
        let now = time::now_millis();
        for event in self.input_handler.process_input(ctx) {
            self.route_event(event, canvas, now);
        }
    }

    fn route_event(&mut self, event: InputEvent, canvas: egui::Rect, now_ms: f64) {
        let editor = &mut self.editor;
        match event {
            InputEvent::PointerDown {
                location,
                button,
                modifiers,
            } => {
                if location.is_on_canvas() {
                    let sample = editor.sample(location.position, canvas, modifiers);
                    editor.pointer_down(sample, button);
                }
            }
            InputEvent::PointerMove { location, modifiers } => {
                // An active gesture keeps tracking outside the canvas.
                if location.is_on_canvas() || !editor.current_state().is_idle() {
                    let sample = editor.sample(location.position, canvas, modifiers);
                    editor.pointer_move(sample);
                } else {
                    editor.pointer_leave();
                }
            }
            InputEvent::PointerUp {
                location, modifiers, ..
            } => {
                let sample = editor.sample(location.position, canvas, modifiers);
                editor.pointer_up(sample);
            }
            InputEvent::PointerLeave => editor.pointer_leave(),
            InputEvent::Wheel { location, delta_y } => {
                if location.is_on_canvas() {
                    editor.zoom(location.position - canvas.min.to_vec2(), delta_y);
                }
            }
            InputEvent::KeyDown { key, modifiers } => editor.key_down(key, modifiers, now_ms),
            InputEvent::KeyUp { key } => editor.key_up(key),
        }
    }

    pub fn render(&mut self, ctx: &egui::Context, painter: &egui::Painter, canvas: egui::Rect) {
        self.renderer
            .render(ctx, painter, canvas, &mut self.editor, time::now_millis());
    }

    fn show_toast(&mut self, ctx: &egui::Context, now_ms: f64) {
        let Some((message, since)) = &self.toast else {
            return;
        };
        if time::elapsed_since(*since, now_ms) > TOAST_DURATION_MS {
            self.toast = None;
            return;
        }
        egui::Area::new(egui::Id::new("error_toast"))
            .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -24.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.colored_label(ui.visuals().error_fg_color, message.as_str());
                });
            });
    }
}

impl eframe::App for PaintApp {
    /// Called by the frame work to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = AppSettings {
            config: self.editor.config().clone(),
            viewport: Some(self.editor.viewport()),
        };
        eframe::set_value(storage, eframe::APP_KEY, &settings);
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = time::now_millis();

        self.file_handler.preview_files_being_dropped(ctx);
        if self.file_handler.check_for_dropped_files(ctx) {
            let outcomes = self.file_handler.process_dropped_files(&mut self.editor);
            if outcomes.contains(&DropOutcome::Imported) {
                self.prompt.clear();
                self.needs_fit = true;
            }
        }

        self.poll_generation(now);
        self.poll_autosave(now);

        tools_panel(self, ctx);
        central_panel(self, ctx);
        self.show_toast(ctx, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::geometry::SelectionBox;
    use image::Rgba;

    fn app_with_document() -> PaintApp {
        let mut app = PaintApp::default();
        let doc = Document::new(RgbaImage::from_pixel(60, 40, Rgba([10, 20, 30, 255]))).unwrap();
        app.editor_mut().load_document(doc);
        app
    }

    #[test]
    fn test_result_stages_layer_and_clears_prompt() {
        let mut app = app_with_document();
        app.editor_mut().select_region(SelectionBox::new(0.0, 0.0, 20.0, 20.0));
        app.prompt = "a boat".to_owned();
        app.editor_mut().begin_generation("a boat").unwrap();

        *app.pending.lock() = Some(Ok(RgbaImage::new(20, 20)));
        app.poll_generation(0.0);
        assert!(app.editor().staged_layer().is_some());
        assert!(app.prompt.is_empty());
        assert!(app.toast.is_none());
    }

    #[test]
    fn test_failure_shows_toast() {
        let mut app = app_with_document();
        app.editor_mut().select_region(SelectionBox::new(0.0, 0.0, 20.0, 20.0));
        app.prompt = "a boat".to_owned();
        app.editor_mut().begin_generation("a boat").unwrap();

        *app.pending.lock() = Some(Err(GenerationError::Service("busy".into())));
        app.poll_generation(0.0);
        assert_eq!(app.prompt, "a boat");
        assert!(app.toast.as_ref().is_some_and(|(m, _)| m.contains("busy")));
    }

    #[test]
    fn test_stale_result_is_discarded_quietly() {
        let mut app = app_with_document();
        app.editor_mut().select_region(SelectionBox::new(0.0, 0.0, 20.0, 20.0));
        app.prompt = "a boat".to_owned();
        app.editor_mut().begin_generation("a boat").unwrap();

        // The document is replaced while the request is in flight.
        let replacement = Document::new(RgbaImage::new(30, 30)).unwrap();
        app.editor_mut().load_document(replacement);

        *app.pending.lock() = Some(Ok(RgbaImage::new(20, 20)));
        app.poll_generation(0.0);
        assert!(app.pending.lock().is_none());
        assert!(app.editor().staged_layer().is_none());
        assert_eq!(app.editor().document().unwrap().width(), 30);
        assert_eq!(app.prompt, "a boat");
        assert!(app.toast.is_none());
    }
}
