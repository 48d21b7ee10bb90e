mod editor_state;
pub mod context;
mod persistence;
mod pointer;

pub use context::{EditorContext, EraserSettings, PointerSample};
pub use editor_state::{DrawingMode, EditorState, LayerTool, StagedPhase};
pub use persistence::{
    Autosave,
    HistorySnapshot,
    MemoryProjectStore,
    PersistenceResult,
    ProjectInfo,
    ProjectStore,
    SavedProject,
};
