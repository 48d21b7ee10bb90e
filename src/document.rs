use std::sync::Arc;

use egui::{Vec2, vec2};
use image::{DynamicImage, RgbaImage, imageops::FilterType};

use crate::error::ImportError;
use crate::history::History;

/// A committed document raster. Shared between history, renderer caches and
/// autosave snapshots without copying.
pub type RasterSnapshot = Arc<RgbaImage>;

/// The base image being edited, with its linear edit history. The raster at
/// the history cursor is the clean base; it only changes on commit, undo and
/// redo.
#[derive(Debug, Clone)]
pub struct Document {
    width: u32,
    height: u32,
    history: History<RasterSnapshot>,
}

impl Document {
    /// Starts a document from an already-sized raster.
    pub fn new(raster: RgbaImage) -> Result<Self, ImportError> {
        let (width, height) = raster.dimensions();
        if width == 0 || height == 0 {
            return Err(ImportError::EmptyImage);
        }
        Ok(Self {
            width,
            height,
            history: History::with_initial(Arc::new(raster)),
        })
    }

    /// Imports a decoded image, downscaling it so neither side exceeds
    /// `max_dimension`.
    pub fn import(image: DynamicImage, max_dimension: u32) -> Result<Self, ImportError> {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(ImportError::EmptyImage);
        }
        let image = if w > max_dimension || h > max_dimension {
            let ratio = (max_dimension as f64 / w as f64).min(max_dimension as f64 / h as f64);
            let nw = ((w as f64 * ratio).floor() as u32).max(1);
            let nh = ((h as f64 * ratio).floor() as u32).max(1);
            log::info!("Downscaling import from {w}x{h} to {nw}x{nh}");
            image.resize_exact(nw, nh, FilterType::Triangle)
        } else {
            image
        };
        Self::new(image.into_rgba8())
    }

    /// Decodes an encoded image (PNG, JPEG, ...) and imports it.
    pub fn from_bytes(bytes: &[u8], max_dimension: u32) -> Result<Self, ImportError> {
        let image = image::load_from_memory(bytes)?;
        Self::import(image, max_dimension)
    }

    /// Rebuilds a document from a saved history. Entries past `cursor` are
    /// kept as redo states.
    pub fn from_history(entries: Vec<RasterSnapshot>, cursor: usize) -> Result<Self, ImportError> {
        let first = entries.first().ok_or(ImportError::EmptyImage)?;
        let (width, height) = first.dimensions();
        if width == 0 || height == 0 {
            return Err(ImportError::EmptyImage);
        }
        let mut history = History::new();
        for entry in entries {
            let actual = entry.dimensions();
            if actual != (width, height) {
                return Err(ImportError::SizeMismatch {
                    expected: (width, height),
                    actual,
                });
            }
            history.push(entry);
        }
        while history.cursor() > cursor.min(history.len() - 1) {
            history.undo();
        }
        Ok(Self { width, height, history })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Vec2 {
        vec2(self.width as f32, self.height as f32)
    }

    /// The raster at the history cursor.
    pub fn current(&self) -> Option<&RasterSnapshot> {
        self.history.current()
    }

    pub fn history(&self) -> &History<RasterSnapshot> {
        &self.history
    }

    /// Records a flattened raster as the new current state. The raster must
    /// match the document size.
    pub fn commit(&mut self, raster: RgbaImage) -> Result<(), ImportError> {
        let expected = (self.width, self.height);
        let actual = raster.dimensions();
        if actual != expected {
            return Err(ImportError::SizeMismatch { expected, actual });
        }
        self.history.push(Arc::new(raster));
        log::info!(
            "Committed document state {} of {}",
            self.history.cursor() + 1,
            self.history.len()
        );
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo().is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_import_downscales_large_images() {
        let big = DynamicImage::ImageRgba8(RgbaImage::new(4000, 1000));
        let doc = Document::import(big, 3072).unwrap();
        assert_eq!((doc.width(), doc.height()), (3072, 768));
    }

    #[test]
    fn test_import_keeps_small_images() {
        let small = DynamicImage::ImageRgba8(RgbaImage::new(640, 480));
        let doc = Document::import(small, 3072).unwrap();
        assert_eq!((doc.width(), doc.height()), (640, 480));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(matches!(Document::new(RgbaImage::new(0, 5)), Err(ImportError::EmptyImage)));
    }

    #[test]
    fn test_commit_and_undo() {
        let mut doc = Document::new(RgbaImage::new(4, 4)).unwrap();
        doc.commit(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]))).unwrap();
        assert!(doc.can_undo());
        assert!(doc.undo());
        assert_eq!(doc.current().unwrap().get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert!(doc.redo());
        assert_eq!(doc.current().unwrap().get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_commit_rejects_wrong_size() {
        let mut doc = Document::new(RgbaImage::new(4, 4)).unwrap();
        let err = doc.commit(RgbaImage::new(5, 4)).unwrap_err();
        assert!(matches!(
            err,
            ImportError::SizeMismatch {
                expected: (4, 4),
                actual: (5, 4)
            }
        ));
        assert_eq!(doc.history().len(), 1);
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_from_history_rejects_mixed_sizes() {
        let entries = vec![Arc::new(RgbaImage::new(2, 2)), Arc::new(RgbaImage::new(3, 2))];
        assert!(matches!(
            Document::from_history(entries, 1),
            Err(ImportError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_history_restores_cursor() {
        let entries = (0..3u8)
            .map(|i| Arc::new(RgbaImage::from_pixel(2, 2, Rgba([i, 0, 0, 255]))))
            .collect();
        let doc = Document::from_history(entries, 1).unwrap();
        assert_eq!(doc.history().cursor(), 1);
        assert!(doc.can_redo());
        assert_eq!(doc.current().unwrap().get_pixel(0, 0).0[0], 1);
    }
}
