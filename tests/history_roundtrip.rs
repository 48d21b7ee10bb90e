use image::{Rgba, RgbaImage};
use region_paint::{Document, EditorConfig, EditorContext, SelectionBox};

const STEPS: usize = 4;

fn commit_step(editor: &mut EditorContext, i: usize) {
    let x = (i * 20) as f32;
    editor.select_region(SelectionBox::new(x, 5.0, 18.0, 18.0));
    editor.begin_generation("step").unwrap();
    let shade = (i as u8 + 1) * 40;
    editor
        .finish_generation(Ok(RgbaImage::from_pixel(18, 18, Rgba([shade, 0, 0, 255]))), 0.0)
        .unwrap();
    assert!(editor.commit_layer());
}

fn current(editor: &EditorContext) -> RgbaImage {
    RgbaImage::clone(editor.document().unwrap().current().unwrap())
}

#[test]
fn test_undo_then_redo_is_bit_exact() {
    let doc = Document::new(RgbaImage::from_pixel(100, 40, Rgba([7, 7, 7, 255]))).unwrap();
    let mut editor = EditorContext::with_document(EditorConfig::default(), doc);

    let mut states = vec![current(&editor)];
    for i in 0..STEPS {
        commit_step(&mut editor, i);
        states.push(current(&editor));
    }
    assert_eq!(editor.document().unwrap().history().len(), STEPS + 1);

    for i in (0..STEPS).rev() {
        assert!(editor.undo());
        assert_eq!(current(&editor), states[i]);
    }
    assert!(!editor.undo());

    for i in 1..=STEPS {
        assert!(editor.redo());
        assert_eq!(current(&editor), states[i]);
    }
    assert!(!editor.redo());
}

#[test]
fn test_commit_after_undo_drops_redo_states() {
    let doc = Document::new(RgbaImage::from_pixel(100, 40, Rgba([7, 7, 7, 255]))).unwrap();
    let mut editor = EditorContext::with_document(EditorConfig::default(), doc);
    commit_step(&mut editor, 0);
    commit_step(&mut editor, 1);
    editor.undo();
    commit_step(&mut editor, 2);

    let history = editor.document().unwrap().history();
    assert_eq!(history.len(), 3);
    assert!(!editor.can_redo());
}
