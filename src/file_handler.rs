use std::sync::Arc;

use eframe::egui;

use crate::document::Document;
use crate::error::ImportError;
use crate::state::EditorContext;

/// What a dropped image turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Replaced the document; the viewport should be refitted
    Imported,
    /// Attached as a style reference for the next generation
    Reference,
    /// Nothing to do with it in the current state
    Ignored,
}

/// Routes one encoded image into the editor. With no document it becomes
/// the document; with a selection it becomes a reference image.
pub fn route_image(editor: &mut EditorContext, bytes: &[u8]) -> Result<DropOutcome, ImportError> {
    if editor.document().is_none() {
        let document = Document::from_bytes(bytes, editor.config().max_import_dimension)?;
        editor.load_document(document);
        return Ok(DropOutcome::Imported);
    }
    if editor.selection().is_some() {
        let image = image::load_from_memory(bytes)?.into_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(ImportError::EmptyImage);
        }
        if !editor.add_reference_image(image) {
            return Ok(DropOutcome::Ignored);
        }
        return Ok(DropOutcome::Reference);
    }
    log::warn!("Dropped image ignored: draw a selection to use it as a reference");
    Ok(DropOutcome::Ignored)
}

#[derive(Debug, Default)]
pub struct FileHandler {
    dropped_files: Vec<egui::DroppedFile>,
}

impl FileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks up files dropped onto the window this frame.
    /// Returns true if any were dropped.
    pub fn check_for_dropped_files(&mut self, ctx: &egui::Context) -> bool {
        let mut new_dropped_files = false;

        ctx.input(|i| {
            if !i.raw.dropped_files.is_empty() {
                self.dropped_files = i.raw.dropped_files.clone();
                new_dropped_files = true;
            }
        });

        new_dropped_files
    }

    /// Feeds the queued files to the editor, returning what each image
    /// became. Unreadable or non-image files are logged and skipped.
    pub fn process_dropped_files(&mut self, editor: &mut EditorContext) -> Vec<DropOutcome> {
        let mut outcomes = Vec::new();

        for file in std::mem::take(&mut self.dropped_files) {
            let file_name = Self::display_name(&file);
            if !Self::is_image_file(&file) {
                log::warn!("Dropped file is not a supported type: {}", file_name);
                continue;
            }
            let Some(bytes) = Self::read_bytes(&file, &file_name) else {
                continue;
            };
            log::info!("Processing dropped image {} ({} bytes)", file_name, bytes.len());
            match route_image(editor, &bytes) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => log::error!("Failed to load {}: {}", file_name, err),
            }
        }

        outcomes
    }

    fn display_name(file: &egui::DroppedFile) -> String {
        if let Some(path) = &file.path {
            path.display().to_string()
        } else if !file.name.is_empty() {
            file.name.clone()
        } else {
            "unknown".to_owned()
        }
    }

    /// Check if a file is an image based on MIME type or extension
    fn is_image_file(file: &egui::DroppedFile) -> bool {
        if !file.mime.is_empty() {
            return file.mime.starts_with("image/");
        }
        let name = match &file.path {
            Some(path) => path.to_string_lossy().to_string(),
            None => file.name.clone(),
        };
        let ext = name.rsplit('.').next().unwrap_or_default().to_lowercase();
        name.contains('.') && matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp")
    }

    fn read_bytes(file: &egui::DroppedFile, file_name: &str) -> Option<Arc<[u8]>> {
        if let Some(bytes) = &file.bytes {
            return Some(bytes.clone());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(path) = &file.path {
            return match std::fs::read(path) {
                Ok(bytes) => Some(bytes.into()),
                Err(err) => {
                    log::error!("Failed to read image file: {}: {}", path.display(), err);
                    None
                }
            };
        }

        log::warn!("Dropped file has no accessible data: {}", file_name);
        None
    }

    /// Dims the window while files are dragged over it.
    pub fn preview_files_being_dropped(&self, ctx: &egui::Context) {
        use egui::{Align2, Color32, Id, LayerId, Order, TextStyle};

        if ctx.input(|i| i.raw.hovered_files.is_empty()) {
            return;
        }

        let text = ctx.input(|i| {
            let mut text = "Dropping files:\n".to_owned();
            for file in &i.raw.hovered_files {
                if let Some(path) = &file.path {
                    text += &format!("\n{}", path.display());
                } else {
                    text += "\n(Path not available)";
                }
            }
            text
        });

        let painter = ctx.layer_painter(LayerId::new(Order::Foreground, Id::new("file_drop_target")));
        let screen_rect = ctx.screen_rect();
        painter.rect_filled(screen_rect, 0.0, Color32::from_black_alpha(192));
        painter.text(
            screen_rect.center(),
            Align2::CENTER_CENTER,
            text,
            TextStyle::Heading.resolve(&ctx.style()),
            Color32::WHITE,
        );
    }
}
