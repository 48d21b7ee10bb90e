use std::sync::Arc;

use egui::{PointerButton, Pos2, pos2};
use image::{Rgba, RgbaImage};
use region_paint::{
    Document,
    DrawingMode,
    EditorConfig,
    EditorContext,
    PointerSample,
    RequestMode,
    SelectionBox,
};

fn gradient_editor() -> EditorContext {
    let image = RgbaImage::from_fn(200, 150, |x, y| Rgba([x as u8, y as u8, 100, 255]));
    EditorContext::with_document(EditorConfig::default(), Document::new(image).unwrap())
}

fn drag(editor: &mut EditorContext, points: &[Pos2]) {
    let (first, rest) = points.split_first().unwrap();
    editor.pointer_down(PointerSample::at(*first), PointerButton::Primary);
    for p in rest {
        editor.pointer_move(PointerSample::at(*p));
    }
    editor.pointer_up(PointerSample::at(*points.last().unwrap()));
}

/// Selection at (20, 20) with one triangle mask painted inside it.
fn editor_with_triangle() -> EditorContext {
    let mut editor = gradient_editor();
    editor.select_region(SelectionBox::new(20.0, 20.0, 100.0, 100.0));
    editor.set_drawing_mode(DrawingMode::Brush);
    drag(&mut editor, &[pos2(30.0, 30.0), pos2(80.0, 30.0), pos2(30.0, 80.0)]);
    assert_eq!(editor.masks().len(), 1);
    editor
}

#[test]
fn test_plain_region_uses_floored_crop() {
    let mut editor = gradient_editor();
    let selection = SelectionBox::new(20.7, 30.2, 64.9, 40.0);
    editor.select_region(selection);

    let request = editor.begin_generation("a cat").unwrap();
    assert_eq!(request.mode, RequestMode::Region);
    assert_eq!(request.image.dimensions(), (64, 40));
    assert_eq!(request.image.get_pixel(0, 0).0, [20, 30, 100, 255]);
    assert_eq!(request.prompt, "a cat");
    assert!(request.mask.is_none());
    assert_eq!(request.region, selection);
    assert_eq!(editor.processing_region(), Some(&selection));
}

#[test]
fn test_blank_prompt_without_moves_builds_nothing() {
    let mut editor = editor_with_triangle();
    assert!(!editor.can_generate("  \n"));
    assert!(editor.begin_generation("  \n").is_none());
    assert!(!editor.is_processing());
}

#[test]
fn test_painted_triangle_becomes_binary_mask() {
    let mut editor = editor_with_triangle();
    let request = editor.begin_generation("a sail").unwrap();
    assert_eq!(request.mode, RequestMode::PaintMask);

    let mask = request.mask.unwrap();
    assert_eq!(mask.dimensions(), (100, 100));
    assert_eq!(mask.get_pixel(20, 20).0[0], 255);
    assert_eq!(mask.get_pixel(80, 80).0[0], 0);
    assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));

    // The image is the untouched crop.
    assert_eq!(request.image.get_pixel(20, 20).0, [40, 40, 100, 255]);
}

#[test]
fn test_moved_triangle_is_cut_and_pasted() {
    let mut editor = editor_with_triangle();
    drag(&mut editor, &[pos2(40.0, 40.0), pos2(60.0, 50.0)]);

    let request = editor.begin_generation("").unwrap();
    assert_eq!(request.mode, RequestMode::CutAndPaste);
    assert!(request.mask.is_none());
    assert!(request.prompt.starts_with(". The image contains a manually moved object"));

    // Uncovered part of the old outline is a transparent hole.
    assert_eq!(request.image.get_pixel(12, 12).0[3], 0);
    // Inside the moved outline the piece is sampled 20px left and 10px up.
    assert_eq!(request.image.get_pixel(35, 25).0, [35, 35, 100, 255]);
    // Outside both outlines the crop is unchanged.
    assert_eq!(request.image.get_pixel(90, 90).0, [110, 110, 100, 255]);
}

#[test]
fn test_reference_images_travel_with_the_request() {
    let mut editor = gradient_editor();
    assert!(!editor.add_reference_image(RgbaImage::new(8, 8)));

    editor.select_region(SelectionBox::new(0.0, 0.0, 50.0, 50.0));
    assert!(editor.add_reference_image(RgbaImage::new(8, 8)));
    assert!(editor.add_reference_image(RgbaImage::new(4, 4)));
    editor.remove_reference_image(0);

    let request = editor.begin_generation("match the style").unwrap();
    assert_eq!(request.reference_images.len(), 1);
    assert_eq!(request.reference_images[0].dimensions(), (4, 4));
    assert!(Arc::ptr_eq(&request.reference_images[0], &editor.reference_images()[0]));
}
