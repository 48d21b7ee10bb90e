use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use image::RgbaImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{Document, RasterSnapshot};
use crate::error::{ImportError, PersistenceError};
use crate::raster;
use crate::util::time;

/// Width of the gallery thumbnail
pub const THUMBNAIL_WIDTH: u32 = 400;

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// The document history up to and including the cursor. Rasters are
/// shared, so taking one is cheap.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    pub entries: Vec<RasterSnapshot>,
    pub cursor: usize,
    pub width: u32,
    pub height: u32,
}

impl HistorySnapshot {
    /// Captures `document`'s history. Redo states are not saved.
    pub fn capture(document: &Document) -> Self {
        let history = document.history();
        let end = (history.cursor() + 1).min(history.len());
        Self {
            entries: history.entries()[..end].to_vec(),
            cursor: history.cursor(),
            width: document.width(),
            height: document.height(),
        }
    }

    /// Scales the current raster down to the gallery thumbnail width.
    pub fn thumbnail(&self) -> Option<RgbaImage> {
        let current = self.entries.get(self.cursor)?;
        let aspect = self.width as f32 / self.height.max(1) as f32;
        let height = ((THUMBNAIL_WIDTH as f32 / aspect) as u32).max(1);
        Some(raster::resize_rgba(current, THUMBNAIL_WIDTH, height))
    }

    /// Rebuilds the document this snapshot was taken from.
    pub fn restore(&self) -> Result<Document, ImportError> {
        Document::from_history(self.entries.clone(), self.cursor)
    }
}

/// Gallery metadata for one saved project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: Uuid,
    pub created_at_ms: f64,
    pub updated_at_ms: f64,
    pub history_len: usize,
    pub cursor: usize,
    pub width: u32,
    pub height: u32,
}

/// A saved project: metadata, thumbnail and history.
#[derive(Debug, Clone)]
pub struct SavedProject {
    pub info: ProjectInfo,
    pub thumbnail: Option<Arc<RgbaImage>>,
    pub history: HistorySnapshot,
}

impl SavedProject {
    pub fn new(id: Uuid, created_at_ms: f64, history: HistorySnapshot, now_ms: f64) -> Self {
        let info = ProjectInfo {
            id,
            created_at_ms,
            updated_at_ms: now_ms,
            history_len: history.entries.len(),
            cursor: history.cursor,
            width: history.width,
            height: history.height,
        };
        Self {
            info,
            thumbnail: history.thumbnail().map(Arc::new),
            history,
        }
    }

    pub fn info_json(&self) -> PersistenceResult<String> {
        Ok(serde_json::to_string(&self.info)?)
    }
}

/// Where projects are kept between sessions. The storage backend is up to
/// the host; futures must not borrow from the store.
pub trait ProjectStore: Send + Sync {
    fn save(&self, project: SavedProject) -> BoxFuture<'static, PersistenceResult<()>>;
    /// Every project, most recently updated first
    fn load_all(&self) -> BoxFuture<'static, PersistenceResult<Vec<SavedProject>>>;
    fn delete(&self, id: Uuid) -> BoxFuture<'static, PersistenceResult<()>>;
    fn clear_all(&self) -> BoxFuture<'static, PersistenceResult<()>>;
}

/// Keeps projects for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjectStore {
    projects: Arc<Mutex<Vec<SavedProject>>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.projects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.lock().is_empty()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn save(&self, project: SavedProject) -> BoxFuture<'static, PersistenceResult<()>> {
        let mut projects = self.projects.lock();
        match projects.iter_mut().find(|p| p.info.id == project.info.id) {
            Some(existing) => *existing = project,
            None => projects.push(project),
        }
        future::ready(Ok(())).boxed()
    }

    fn load_all(&self) -> BoxFuture<'static, PersistenceResult<Vec<SavedProject>>> {
        let mut projects = self.projects.lock().clone();
        projects.sort_by(|a, b| b.info.updated_at_ms.total_cmp(&a.info.updated_at_ms));
        future::ready(Ok(projects)).boxed()
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'static, PersistenceResult<()>> {
        self.projects.lock().retain(|p| p.info.id != id);
        future::ready(Ok(())).boxed()
    }

    fn clear_all(&self) -> BoxFuture<'static, PersistenceResult<()>> {
        self.projects.lock().clear();
        future::ready(Ok(())).boxed()
    }
}

/// Debounces saves of one project: a save becomes due once the document
/// history has stayed unchanged for `debounce_ms`.
#[derive(Debug, Clone)]
pub struct Autosave {
    project_id: Uuid,
    created_at_ms: f64,
    debounce_ms: f64,
    /// (history revision, cursor) last seen
    seen: Option<(u64, usize)>,
    dirty_since: Option<f64>,
}

impl Autosave {
    pub fn new(debounce_ms: f64, now_ms: f64) -> Self {
        Self {
            project_id: Uuid::new_v4(),
            created_at_ms: now_ms,
            debounce_ms,
            seen: None,
            dirty_since: None,
        }
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// Call once per frame. Returns the project to save when the debounce
    /// window has passed since the last history change.
    pub fn poll(&mut self, document: Option<&Document>, now_ms: f64) -> Option<SavedProject> {
        let document = document?;
        let key = (document.history().revision(), document.history().cursor());
        if self.seen != Some(key) {
            self.seen = Some(key);
            self.dirty_since = Some(now_ms);
            return None;
        }
        let since = self.dirty_since?;
        if time::elapsed_since(since, now_ms) < self.debounce_ms {
            return None;
        }
        self.dirty_since = None;
        log::debug!("Autosaving project {}", self.project_id);
        Some(SavedProject::new(
            self.project_id,
            self.created_at_ms,
            HistorySnapshot::capture(document),
            now_ms,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn document() -> Document {
        let mut doc = Document::new(RgbaImage::from_pixel(800, 400, Rgba([1, 1, 1, 255]))).unwrap();
        doc.commit(RgbaImage::from_pixel(800, 400, Rgba([2, 2, 2, 255]))).unwrap();
        doc.commit(RgbaImage::from_pixel(800, 400, Rgba([3, 3, 3, 255]))).unwrap();
        doc.undo();
        doc
    }

    #[test]
    fn test_snapshot_stops_at_cursor() {
        let snapshot = HistorySnapshot::capture(&document());
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.cursor, 1);
        let thumb = snapshot.thumbnail().unwrap();
        assert_eq!(thumb.dimensions(), (400, 200));
        let restored = snapshot.restore().unwrap();
        assert_eq!(restored.current().unwrap().get_pixel(0, 0).0[0], 2);
        assert!(!restored.can_redo());
    }

    #[test]
    fn test_autosave_debounces() {
        let mut doc = document();
        let mut autosave = Autosave::new(1500.0, 0.0);
        assert!(autosave.poll(Some(&doc), 0.0).is_none());
        assert!(autosave.poll(Some(&doc), 1000.0).is_none());

        doc.redo();
        assert!(autosave.poll(Some(&doc), 1200.0).is_none());
        assert!(autosave.poll(Some(&doc), 2000.0).is_none());
        let saved = autosave.poll(Some(&doc), 2700.0).unwrap();
        assert_eq!(saved.info.cursor, 2);
        assert_eq!(saved.info.history_len, 3);
        assert!(autosave.poll(Some(&doc), 5000.0).is_none());
    }

    #[test]
    fn test_memory_store_orders_by_update() {
        let store = MemoryProjectStore::new();
        let snapshot = HistorySnapshot::capture(&document());
        let first = SavedProject::new(Uuid::new_v4(), 0.0, snapshot.clone(), 10.0);
        let second = SavedProject::new(Uuid::new_v4(), 0.0, snapshot, 20.0);
        let first_id = first.info.id;
        futures::executor::block_on(store.save(first)).unwrap();
        futures::executor::block_on(store.save(second)).unwrap();

        let all = futures::executor::block_on(store.load_all()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].info.updated_at_ms > all[1].info.updated_at_ms);

        futures::executor::block_on(store.delete(first_id)).unwrap();
        assert_eq!(store.len(), 1);
        futures::executor::block_on(store.clear_all()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_info_serializes() {
        let project = SavedProject::new(Uuid::new_v4(), 1.0, HistorySnapshot::capture(&document()), 2.0);
        let json = project.info_json().unwrap();
        let info: ProjectInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, project.info);
    }
}
