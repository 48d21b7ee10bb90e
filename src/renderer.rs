use std::sync::Arc;

use egui::{Color32, Pos2, Rect, Shape, pos2, vec2};
use image::{Rgba, RgbaImage};

use crate::document::Document;
use crate::geometry::SelectionBox;
use crate::gizmo::ChromePainter;
use crate::raster;
use crate::state::{DrawingMode, EditorContext, LayerTool};
use crate::texture_manager::{self, TextureManager};

/// Planes alive at once, with room for one stale version each
const MAX_CACHED_TEXTURES: usize = 6;
const CANVAS_BACKGROUND: Color32 = Color32::from_gray(24);

/// Period divisor of the processing pulse, `(sin(t / 200) + 1) / 2`
const PULSE_DIVISOR_MS: f64 = 200.0;
/// Pulse values are snapped to this many steps so the overlay is not rebuilt
/// every frame
const PULSE_STEPS: f32 = 16.0;
/// Reveal blur is snapped to multiples of this many pixels, so a reveal
/// rebuilds the staged plane at most a handful of times
const REVEAL_BLUR_STEP: f32 = 8.0;

const PRISTINE_MASK_FILL: Rgba<u8> = Rgba([255, 0, 0, 102]);
const MASK_HOLE_FILL: Rgba<u8> = Rgba([0, 0, 0, 102]);
const PATH_PREVIEW_FILL: Rgba<u8> = Rgba([255, 0, 0, 128]);

/// Which raster a frame plane holds. Planes are drawn in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneKind {
    Document,
    StagedLayer,
    /// Selection-clipped masks, processing pulse and path preview
    Overlay,
}

impl PlaneKind {
    /// Texture slot of the plane.
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// A raster drawn at `rect` (document space) with `opacity`.
#[derive(Debug, Clone)]
pub struct FramePlane {
    pub kind: PlaneKind,
    /// Changes whenever `image` changes
    pub version: u64,
    pub image: Arc<RgbaImage>,
    pub rect: Rect,
    pub opacity: f32,
}

/// Everything drawn for one frame: cached raster planes, then vector
/// chrome in screen space.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub planes: Vec<FramePlane>,
    pub chrome: Vec<Shape>,
}

impl Frame {
    pub fn plane(&self, kind: PlaneKind) -> Option<&FramePlane> {
        self.planes.iter().find(|p| p.kind == kind)
    }

    /// Composites the planes into a `width` x `height` document-space
    /// raster. Chrome is not included.
    pub fn flatten(&self, width: u32, height: u32) -> RgbaImage {
        let mut out = RgbaImage::new(width, height);
        for plane in &self.planes {
            let w = plane.rect.width().round().max(1.0) as u32;
            let h = plane.rect.height().round().max(1.0) as u32;
            let image = raster::resize_rgba(&plane.image, w, h);
            raster::blend_over(
                &mut out,
                &image,
                plane.rect.min.x.round() as i64,
                plane.rect.min.y.round() as i64,
                plane.opacity,
            );
        }
        out
    }
}

#[derive(Debug)]
struct CachedPlane<K> {
    key: K,
    version: u64,
    image: Arc<RgbaImage>,
}

/// Returns the cached plane for `key`, rebuilding it when the key changed.
fn refresh<K: PartialEq>(
    cache: &mut Option<CachedPlane<K>>,
    key: K,
    next_version: &mut u64,
    build: impl FnOnce() -> Option<Arc<RgbaImage>>,
) -> Option<(u64, Arc<RgbaImage>)> {
    if let Some(cached) = cache.as_ref().filter(|c| c.key == key) {
        return Some((cached.version, cached.image.clone()));
    }
    let image = build()?;
    *next_version += 1;
    *cache = Some(CachedPlane {
        key,
        version: *next_version,
        image: image.clone(),
    });
    Some((*next_version, image))
}

/// Inputs that invalidate the overlay plane
#[derive(Debug, Clone, PartialEq)]
struct OverlayKey {
    clip: SelectionBox,
    masks: u64,
    path_len: usize,
    drawing_mode: DrawingMode,
    document: (u64, usize),
    pulse: Option<u8>,
}

/// Processing pulse in `0..=1` at `now_ms`, snapped to `PULSE_STEPS`.
fn pulse_step(now_ms: f64) -> u8 {
    let alpha = (((now_ms / PULSE_DIVISOR_MS).sin() + 1.0) / 2.0) as f32;
    (alpha * PULSE_STEPS).round() as u8
}

/// Reveal blur extent snapped to `REVEAL_BLUR_STEP`.
fn reveal_blur_level(blur: f32) -> u32 {
    ((blur.max(0.0) / REVEAL_BLUR_STEP).round() * REVEAL_BLUR_STEP) as u32
}

fn document_key(document: &Document) -> (u64, usize) {
    (document.history().revision(), document.history().cursor())
}

/// Builds frames from the editor state and draws them with egui.
#[derive(Debug)]
pub struct Renderer {
    textures: TextureManager,
    document: Option<CachedPlane<(u64, usize)>>,
    /// Keyed on (compositor version, blur level)
    staged: Option<CachedPlane<(u64, u32)>>,
    overlay: Option<CachedPlane<OverlayKey>>,
    next_version: u64,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            textures: TextureManager::new(MAX_CACHED_TEXTURES),
            document: None,
            staged: None,
            overlay: None,
            next_version: 0,
        }
    }

    /// Lays out the frame for `editor` over `canvas` at `now_ms`.
    pub fn build_frame(&mut self, editor: &mut EditorContext, canvas: Rect, now_ms: f64) -> Frame {
        let mut frame = Frame::default();
        let Some(document) = editor.document() else {
            return frame;
        };
        let doc_rect = Rect::from_min_size(Pos2::ZERO, document.size());
        let key = document_key(document);
        let raster = document.current().cloned();
        if let Some((version, image)) = refresh(&mut self.document, key, &mut self.next_version, || raster) {
            frame.planes.push(FramePlane {
                kind: PlaneKind::Document,
                version,
                image,
                rect: doc_rect,
                opacity: 1.0,
            });
        }

        if let Some(plane) = self.staged_plane(editor, now_ms) {
            frame.planes.push(plane);
        }
        if let Some(plane) = self.overlay_plane(editor, now_ms) {
            frame.planes.push(plane);
        }
        frame.chrome = build_chrome(editor, canvas, now_ms);
        frame
    }

    fn staged_plane(&mut self, editor: &mut EditorContext, now_ms: f64) -> Option<FramePlane> {
        let layer = editor.staged_layer()?;
        let reveal = layer.reveal(now_ms, editor.config().reveal_duration_ms);
        let layer_rect = layer.rect();
        let (composite, composite_version) = editor.staged_composite()?;

        let blur = reveal_blur_level(reveal.blur);
        let (w, h) = composite.dimensions();
        let build = || {
            if blur == 0 {
                return Some(composite.clone());
            }
            log::debug!("Rebuilding reveal blur at {blur}px");
            Some(Arc::new(raster::blur_rgba(&raster::pad(&composite, blur), blur as f32)))
        };
        let (version, image) = refresh(&mut self.staged, (composite_version, blur), &mut self.next_version, build)?;

        // The padding is in composite pixels; grow the rect to match.
        let grow = vec2(
            blur as f32 * layer_rect.width() / w.max(1) as f32,
            blur as f32 * layer_rect.height() / h.max(1) as f32,
        );
        Some(FramePlane {
            kind: PlaneKind::StagedLayer,
            version,
            image,
            rect: layer_rect.expand2(grow),
            opacity: reveal.opacity,
        })
    }

    fn overlay_plane(&mut self, editor: &EditorContext, now_ms: f64) -> Option<FramePlane> {
        let clip = editor.processing_region().or(editor.selection()).copied()?;
        let document = editor.document()?;
        let px = clip.floored();
        if px.width == 0 || px.height == 0 {
            return None;
        }
        let pulse = editor.is_processing().then(|| pulse_step(now_ms));
        let key = OverlayKey {
            clip,
            masks: editor.masks().revision(),
            path_len: editor.path().len(),
            drawing_mode: editor.drawing_mode(),
            document: document_key(document),
            pulse,
        };
        let build = || build_overlay(editor, &clip, pulse).map(Arc::new);
        let (version, image) = refresh(&mut self.overlay, key, &mut self.next_version, build)?;
        Some(FramePlane {
            kind: PlaneKind::Overlay,
            version,
            image,
            rect: Rect::from_min_size(
                pos2(px.x as f32, px.y as f32),
                vec2(px.width as f32, px.height as f32),
            ),
            opacity: 1.0,
        })
    }

    /// Draws `editor` into `canvas` and asks for the next frame.
    pub fn render(
        &mut self,
        ctx: &egui::Context,
        painter: &egui::Painter,
        canvas: Rect,
        editor: &mut EditorContext,
        now_ms: f64,
    ) {
        self.textures.begin_frame();
        let painter = painter.with_clip_rect(canvas);
        painter.rect_filled(canvas, 0.0, CANVAS_BACKGROUND);

        let frame = self.build_frame(editor, canvas, now_ms);
        let viewport = editor.viewport();
        let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
        for plane in &frame.planes {
            let image = plane.image.clone();
            let texture = self.textures.get_or_create_texture(
                plane.kind.slot(),
                plane.version,
                || texture_manager::to_color_image(&image),
                ctx,
            );
            match texture {
                Ok(id) => {
                    let rect = viewport.document_rect_to_screen(plane.rect, canvas);
                    painter.image(id, rect, uv, Color32::WHITE.gamma_multiply(plane.opacity));
                }
                Err(e) => log::warn!("Skipping {:?} plane: {e}", plane.kind),
            }
        }
        painter.extend(frame.chrome);

        // Continuous loop: the path buffer and animations change without events.
        ctx.request_repaint();
    }
}

/// Rasterises the selection-clipped mask layer in the pixel grid of the
/// floored `clip` box. Returns `None` when there is nothing to show.
fn build_overlay(editor: &EditorContext, clip: &SelectionBox, pulse: Option<u8>) -> Option<RgbaImage> {
    let masks = editor.masks();
    let path = editor.path();
    let preview = editor.drawing_mode() == DrawingMode::Brush && path.len() >= 3;
    if pulse.is_none() && masks.is_empty() && !preview {
        return None;
    }

    let px = clip.floored();
    let origin = vec2(px.x as f32, px.y as f32);
    let mut out = RgbaImage::new(px.width, px.height);
    // The clip box expressed in overlay pixels
    let frame = SelectionBox::new(clip.x - origin.x, clip.y - origin.y, clip.width, clip.height);

    if let Some(step) = pulse {
        let alpha = 0.4 + 0.3 * step as f32 / PULSE_STEPS;
        raster::fill_rgba(&mut out, Rgba([255, 100, 150, (alpha * 255.0).round() as u8]));
    }

    for mask in masks.iter() {
        let fill = if mask.is_transformed() {
            MASK_HOLE_FILL
        } else {
            PRISTINE_MASK_FILL
        };
        raster::fill_polygon_rgba(&mut out, &mask.original_outline(&frame), fill);
    }

    if let Some(source) = editor.document().and_then(Document::current) {
        let (w, h) = out.dimensions();
        let (sw, sh) = (source.width() as i64, source.height() as i64);
        for mask in masks.iter().filter(|m| m.is_transformed()) {
            let outline = mask.transformed_outline(&frame);
            raster::for_each_pixel_in_polygon(&outline, w, h, |x, y| {
                let local = mask.document_to_local(pos2(x as f32 + 0.5, y as f32 + 0.5), &frame);
                let from = local + mask.center().to_vec2() + frame.origin().to_vec2() + origin;
                let (sx, sy) = (from.x.floor() as i64, from.y.floor() as i64);
                if sx >= 0 && sy >= 0 && sx < sw && sy < sh {
                    let src = *source.get_pixel(sx as u32, sy as u32);
                    raster::blend_pixel(out.get_pixel_mut(x, y), src, 1.0);
                }
            });
        }
    }

    if preview {
        let offset = frame.origin().to_vec2();
        let polygon: Vec<Pos2> = path.points().iter().map(|p| *p + offset).collect();
        raster::fill_polygon_rgba(&mut out, &polygon, PATH_PREVIEW_FILL);
    }
    Some(out)
}

/// Vector chrome for the current state, in screen space.
fn build_chrome(editor: &EditorContext, canvas: Rect, now_ms: f64) -> Vec<Shape> {
    let viewport = editor.viewport();
    let mut chrome = ChromePainter::new(canvas, viewport);

    if let Some(layer) = editor.staged_layer() {
        let reveal = layer.reveal(now_ms, editor.config().reveal_duration_ms);
        let show = reveal.shows_chrome() && !editor.is_processing() && !editor.is_adjusting_feather();
        let state = editor.current_state();
        if show && editor.layer_tool() == LayerTool::Move {
            if state.active_layer_handle().is_none() && !editor.recently_nudged(now_ms) {
                chrome.layer_border(layer.rect());
            }
            chrome.layer_handles(layer.rect());
        }
    }

    if let Some(selection) = editor.selection() {
        let masks = editor.masks();
        for mask in masks.iter() {
            if mask.is_transformed() {
                chrome.mask_hole(mask, selection);
            }
            let selected = masks.selected_id() == Some(mask.id());
            if !selected && editor.hovered_mask() == Some(mask.id()) {
                chrome.mask_hover(mask, selection);
            }
        }
        if let Some(mask) = masks.selected() {
            chrome.selected_mask(mask, selection);
        }
        if editor.drawing_mode() == DrawingMode::Brush {
            chrome.path_outline(editor.path().points(), selection);
        }
    }

    if let Some(outlined) = editor.processing_region().or(editor.selection()) {
        chrome.selection_outline(outlined);
    }

    if let Some((centre, diameter)) = editor.eraser_outline() {
        chrome.eraser(centre, diameter);
    }
    chrome.into_shapes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::state::PointerSample;
    use egui::PointerButton;

    fn editor() -> EditorContext {
        let doc = Document::new(RgbaImage::from_pixel(100, 80, Rgba([0, 0, 255, 255]))).unwrap();
        EditorContext::with_document(EditorConfig::default(), doc)
    }

    fn canvas() -> Rect {
        Rect::from_min_size(Pos2::ZERO, vec2(400.0, 300.0))
    }

    fn draw_triangle_mask(editor: &mut EditorContext) {
        editor.select_region(SelectionBox::new(10.0, 10.0, 60.0, 60.0));
        editor.set_drawing_mode(DrawingMode::Brush);
        editor.pointer_down(PointerSample::at(pos2(15.0, 15.0)), PointerButton::Primary);
        editor.pointer_move(PointerSample::at(pos2(55.0, 15.0)));
        editor.pointer_move(PointerSample::at(pos2(15.0, 55.0)));
        editor.pointer_up(PointerSample::at(pos2(15.0, 55.0)));
    }

    #[test]
    fn test_document_plane_version_tracks_history() {
        let mut editor = editor();
        let mut renderer = Renderer::new();
        let first = renderer.build_frame(&mut editor, canvas(), 0.0);
        let second = renderer.build_frame(&mut editor, canvas(), 16.0);
        let v1 = first.plane(PlaneKind::Document).unwrap().version;
        assert_eq!(v1, second.plane(PlaneKind::Document).unwrap().version);

        editor.select_region(SelectionBox::new(0.0, 0.0, 20.0, 20.0));
        editor.begin_generation("x").unwrap();
        editor.finish_generation(Ok(RgbaImage::new(20, 20)), 0.0).unwrap();
        editor.commit_layer();
        let third = renderer.build_frame(&mut editor, canvas(), 32.0);
        assert_ne!(v1, third.plane(PlaneKind::Document).unwrap().version);
    }

    #[test]
    fn test_pristine_mask_is_tinted_red() {
        let mut editor = editor();
        draw_triangle_mask(&mut editor);
        let mut renderer = Renderer::new();
        let frame = renderer.build_frame(&mut editor, canvas(), 0.0);
        assert!(frame.plane(PlaneKind::Overlay).is_some());

        let flat = frame.flatten(100, 80);
        let inside = flat.get_pixel(20, 20).0;
        let outside = flat.get_pixel(60, 60).0;
        assert!(inside[0] > 90);
        assert_eq!(outside, [0, 0, 255, 255]);
    }

    #[test]
    fn test_overlay_is_cached_until_masks_change() {
        let mut editor = editor();
        draw_triangle_mask(&mut editor);
        let mut renderer = Renderer::new();
        let a = renderer.build_frame(&mut editor, canvas(), 0.0);
        let b = renderer.build_frame(&mut editor, canvas(), 5.0);
        let version = |f: &Frame| f.plane(PlaneKind::Overlay).unwrap().version;
        assert_eq!(version(&a), version(&b));

        // Clicking the mask selects it.
        editor.pointer_down(PointerSample::at(pos2(20.0, 20.0)), PointerButton::Primary);
        editor.pointer_up(PointerSample::at(pos2(20.0, 20.0)));
        assert!(editor.masks().selected().is_some());
        let c = renderer.build_frame(&mut editor, canvas(), 10.0);
        assert_ne!(version(&a), version(&c));

        assert!(editor.delete_selected_mask());
        let d = renderer.build_frame(&mut editor, canvas(), 15.0);
        assert!(d.plane(PlaneKind::Overlay).is_none());
    }

    #[test]
    fn test_reveal_fades_in() {
        let mut editor = editor();
        editor.select_region(SelectionBox::new(10.0, 10.0, 40.0, 30.0));
        editor.begin_generation("x").unwrap();
        editor
            .finish_generation(Ok(RgbaImage::from_pixel(40, 30, Rgba([255, 0, 0, 255]))), 1000.0)
            .unwrap();
        let mut renderer = Renderer::new();

        let early = renderer.build_frame(&mut editor, canvas(), 1100.0);
        let plane = early.plane(PlaneKind::StagedLayer).unwrap();
        assert!(plane.opacity < 1.0);
        assert!(plane.rect.width() > 40.0);
        assert!(early.chrome.is_empty());

        let done = renderer.build_frame(&mut editor, canvas(), 5000.0);
        let plane = done.plane(PlaneKind::StagedLayer).unwrap();
        assert_eq!(plane.opacity, 1.0);
        assert_eq!(plane.rect, editor.staged_layer().unwrap().rect());
        assert!(!done.chrome.is_empty());
    }

    #[test]
    fn test_reveal_blur_levels() {
        assert_eq!(reveal_blur_level(30.0), 32);
        assert_eq!(reveal_blur_level(13.0), 16);
        assert_eq!(reveal_blur_level(3.9), 0);
        assert_eq!(reveal_blur_level(-1.0), 0);
    }

    #[test]
    fn test_reveal_rebuilds_staged_plane_a_few_times() {
        let mut editor = editor();
        editor.select_region(SelectionBox::new(10.0, 10.0, 40.0, 30.0));
        editor.begin_generation("x").unwrap();
        editor
            .finish_generation(Ok(RgbaImage::from_pixel(40, 30, Rgba([255, 0, 0, 255]))), 0.0)
            .unwrap();
        let mut renderer = Renderer::new();

        let mut versions = Vec::new();
        let mut t = 0.0;
        while t <= 1600.0 {
            let frame = renderer.build_frame(&mut editor, canvas(), t);
            let version = frame.plane(PlaneKind::StagedLayer).unwrap().version;
            if versions.last() != Some(&version) {
                versions.push(version);
            }
            t += 16.0;
        }
        // One build per blur level (32, 24, 16, 8) plus the sharp layer.
        assert!(versions.len() <= 5, "{versions:?}");
        assert!(versions.len() >= 2);
    }

    #[test]
    fn test_processing_pulse_fills_region() {
        let mut editor = editor();
        editor.select_region(SelectionBox::new(10.0, 10.0, 40.0, 30.0));
        editor.begin_generation("x").unwrap();
        let mut renderer = Renderer::new();
        let frame = renderer.build_frame(&mut editor, canvas(), 0.0);
        let overlay = frame.plane(PlaneKind::Overlay).unwrap();
        assert_eq!(overlay.rect, Rect::from_min_size(pos2(10.0, 10.0), vec2(40.0, 30.0)));
        let px = overlay.image.get_pixel(5, 5).0;
        assert_eq!(&px[..3], &[255, 100, 150]);
    }

    #[test]
    fn test_render_uploads_planes() {
        let mut editor = editor();
        let mut renderer = Renderer::new();
        let ctx = egui::Context::default();
        let painter = egui::Painter::new(ctx.clone(), egui::LayerId::background(), canvas());
        renderer.render(&ctx, &painter, canvas(), &mut editor, 0.0);
        assert_eq!(renderer.textures.cache_size(), 1);
    }
}
