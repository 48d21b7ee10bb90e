use egui::{Key, Modifiers, PointerButton, pos2};
use futures::executor::block_on;
use image::{Rgba, RgbaImage};
use region_paint::state::{Autosave, MemoryProjectStore, ProjectStore, StagedPhase};
use region_paint::{Document, EditorConfig, EditorContext, LayerTool, PointerSample, SelectionBox};

const BASE: [u8; 4] = [0, 0, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

fn staged_editor(feather: f32) -> EditorContext {
    let doc = Document::new(RgbaImage::from_pixel(120, 120, Rgba(BASE))).unwrap();
    let config = EditorConfig {
        default_feather: feather,
        ..EditorConfig::default()
    };
    let mut editor = EditorContext::with_document(config, doc);
    editor.select_region(SelectionBox::new(10.0, 10.0, 50.0, 50.0));
    editor.begin_generation("red square").unwrap();
    editor
        .finish_generation(Ok(RgbaImage::from_pixel(50, 50, Rgba(RED))), 0.0)
        .unwrap();
    editor
}

#[test]
fn test_reveal_phases() {
    let mut editor = staged_editor(5.0);
    assert!(matches!(editor.staged_phase(100.0), StagedPhase::Revealing { .. }));
    assert_eq!(editor.staged_phase(2000.0), StagedPhase::Editing);

    editor.set_layer_tool(LayerTool::Eraser);
    editor.pointer_down(PointerSample::at(pos2(30.0, 30.0)), PointerButton::Primary);
    assert_eq!(editor.staged_phase(2000.0), StagedPhase::Erasing);
    editor.pointer_up(PointerSample::at(pos2(30.0, 30.0)));
    assert_eq!(editor.staged_phase(2000.0), StagedPhase::Editing);
}

#[test]
fn test_unfeathered_commit_has_rounded_corners() {
    let mut editor = staged_editor(0.0);
    assert!(editor.commit_layer());
    let flat = editor.document().unwrap().current().unwrap();
    assert_eq!(flat.get_pixel(35, 35).0, RED);
    assert_eq!(flat.get_pixel(10, 10).0, BASE);
    assert_eq!(flat.get_pixel(35, 10).0, RED);
    assert_eq!(flat.get_pixel(5, 5).0, BASE);
}

#[test]
fn test_feathered_commit_fades_towards_edges() {
    let mut editor = staged_editor(10.0);
    assert!(editor.commit_layer());
    let flat = editor.document().unwrap().current().unwrap();
    let centre = flat.get_pixel(35, 35).0[0];
    let near_edge = flat.get_pixel(35, 12).0[0];
    assert_eq!(centre, 255);
    assert!(near_edge < centre);
    assert_eq!(flat.get_pixel(10, 10).0, BASE);
}

#[test]
fn test_nudge_moves_and_hides_border() {
    let mut editor = staged_editor(5.0);
    editor.key_down(Key::ArrowLeft, Modifiers::NONE, 5000.0);
    editor.key_down(Key::ArrowDown, Modifiers::SHIFT, 5100.0);
    let layer = editor.staged_layer().unwrap();
    assert_eq!((layer.x, layer.y), (9.0, 20.0));
    assert!(editor.recently_nudged(5500.0));
    assert!(!editor.recently_nudged(6200.0));

    assert!(editor.undo_layer());
    assert!(editor.undo_layer());
    assert!(!editor.undo_layer());
    assert!(editor.redo_layer());
    assert_eq!(editor.staged_layer().unwrap().x, 9.0);
}

#[test]
fn test_commit_clears_layer_history() {
    let mut editor = staged_editor(5.0);
    editor.key_down(Key::ArrowRight, Modifiers::NONE, 0.0);
    assert!(editor.commit_layer());
    assert!(editor.layer_history().is_empty());
    assert!(!editor.undo_layer());
    assert_eq!(editor.document().unwrap().history().len(), 2);
}

#[test]
fn test_autosave_after_commit() {
    let mut editor = staged_editor(5.0);
    let store = MemoryProjectStore::new();
    let mut autosave = Autosave::new(1500.0, 0.0);

    assert!(autosave.poll(editor.document(), 0.0).is_none());
    editor.commit_layer();
    assert!(autosave.poll(editor.document(), 100.0).is_none());
    assert!(autosave.poll(editor.document(), 1000.0).is_none());

    let project = autosave.poll(editor.document(), 1700.0).unwrap();
    assert_eq!(project.info.history_len, 2);
    assert_eq!(project.info.cursor, 1);
    assert_eq!(project.thumbnail.as_ref().unwrap().width(), 400);
    block_on(store.save(project)).unwrap();

    let saved = block_on(store.load_all()).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].info.id, autosave.project_id());
    let restored = saved[0].history.restore().unwrap();
    assert_eq!(restored.current(), editor.document().unwrap().current());
}
