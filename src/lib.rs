#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod brush;
pub mod config;
pub mod document;
pub mod error;
pub mod file_handler;
pub mod geometry;
pub mod gizmo;
pub mod history;
pub mod input;
pub mod layer;
pub mod mask;
pub mod panels;
pub mod raster;
pub mod renderer;
pub mod request;
pub mod service;
pub mod state;
pub mod stroke;
pub mod texture_manager;
pub mod util;
pub mod viewport;

pub use app::PaintApp;
pub use config::EditorConfig;
pub use document::Document;
pub use error::{ConfigError, GenerationError, ImportError, PersistenceError};
pub use geometry::{Handle, SelectionBox};
pub use history::History;
pub use input::{InputEvent, InputLocation};
pub use layer::StagedLayer;
pub use mask::{MaskId, MaskObject, MaskSet, MaskTransform};
pub use renderer::{Frame, FramePlane, PlaneKind, Renderer};
pub use request::{RegionRequest, RequestMode};
pub use service::{PassthroughRegenerator, Regenerator};
pub use state::{DrawingMode, EditorContext, EditorState, LayerTool, PointerSample};
pub use viewport::Viewport;
