//! The staged layer: a generated patch floating above the document until it
//! is committed or cancelled, plus the cached compositor that turns it into
//! the pixels that are drawn and baked.

use std::sync::Arc;

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use image::{GrayImage, RgbaImage};

use crate::geometry::{Handle, SelectionBox};
use crate::raster;

/// Corner radius of the staged layer clip, document pixels
pub const LAYER_CORNER_RADIUS: f32 = 12.0;
/// Smallest width or height a layer can be resized to
pub const MIN_LAYER_SIZE: f32 = 20.0;
/// Blur extent at the very start of the reveal animation
pub const REVEAL_MAX_BLUR: f32 = 30.0;
/// Reveal progress after which layer handles are shown
pub const CHROME_REVEAL_PROGRESS: f32 = 0.8;
/// Minimum placement change that counts as an edit
const PLACEMENT_EPSILON: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct StagedLayer {
    pub image: Arc<RgbaImage>,
    /// Erasure alpha at the image's native resolution; white erases
    pub mask_image: Option<Arc<GrayImage>>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub feather: f32,
    pub reveal_start_ms: f64,
}

impl StagedLayer {
    /// Places a generated image over the floored selection rectangle.
    pub fn from_generation(image: RgbaImage, selection: &SelectionBox, feather: f32, now_ms: f64) -> Self {
        let px = selection.floored();
        Self {
            image: Arc::new(image),
            mask_image: None,
            x: px.x as f32,
            y: px.y as f32,
            width: px.width.max(1) as f32,
            height: px.height.max(1) as f32,
            feather,
            reveal_start_ms: now_ms,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_min_size(pos2(self.x, self.y), vec2(self.width, self.height))
    }

    pub fn set_rect(&mut self, rect: Rect) {
        self.x = rect.min.x;
        self.y = rect.min.y;
        self.width = rect.width();
        self.height = rect.height();
    }

    pub fn image_size(&self) -> Vec2 {
        vec2(self.image.width() as f32, self.image.height() as f32)
    }

    /// Pixel size of the composite drawn at the layer's placement.
    pub fn display_size(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }

    /// Maps a document point into the layer image's pixel space.
    pub fn to_image_space(&self, p: Pos2) -> Pos2 {
        let scale = self.image_size() / vec2(self.width, self.height);
        pos2((p.x - self.x) * scale.x, (p.y - self.y) * scale.y)
    }

    /// True if the placement moved away from `initial` by more than 0.1px.
    pub fn moved_from(&self, initial: Rect) -> bool {
        (self.x - initial.min.x).abs() > PLACEMENT_EPSILON
            || (self.y - initial.min.y).abs() > PLACEMENT_EPSILON
            || (self.width - initial.width()).abs() > PLACEMENT_EPSILON
            || (self.height - initial.height()).abs() > PLACEMENT_EPSILON
    }

    pub fn reveal(&self, now_ms: f64, duration_ms: f64) -> Reveal {
        Reveal::at(now_ms - self.reveal_start_ms, duration_ms)
    }
}

/// Fade-and-sharpen animation state of a freshly staged layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reveal {
    pub progress: f32,
    pub opacity: f32,
    /// Blur extent in document pixels
    pub blur: f32,
}

impl Reveal {
    pub const DONE: Self = Self {
        progress: 1.0,
        opacity: 1.0,
        blur: 0.0,
    };

    pub fn at(age_ms: f64, duration_ms: f64) -> Self {
        if duration_ms <= 0.0 || age_ms >= duration_ms {
            return Self::DONE;
        }
        let progress = (age_ms.max(0.0) / duration_ms) as f32;
        let ease = 1.0 - (1.0 - progress).powi(3);
        Self {
            progress,
            opacity: ease,
            blur: (1.0 - ease) * REVEAL_MAX_BLUR,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.progress < 1.0
    }

    pub fn shows_chrome(&self) -> bool {
        self.progress > CHROME_REVEAL_PROGRESS
    }
}

/// New placement for a handle drag of `delta` document pixels starting from
/// `initial`. Corners keep the aspect ratio; `symmetric` doubles the delta
/// and keeps the centre fixed.
pub fn resize_layer_rect(handle: Handle, initial: Rect, delta: Vec2, symmetric: bool) -> Rect {
    let (ix, iy) = (initial.min.x, initial.min.y);
    let (iw, ih) = (initial.width(), initial.height());
    let gain = if symmetric { 2.0 } else { 1.0 };
    let (mut nx, mut ny, mut nw, mut nh) = (ix, iy, iw, ih);

    match handle {
        Handle::Move => {
            nx = ix + delta.x;
            ny = iy + delta.y;
        }
        Handle::Rotate => {}
        h if h.is_corner() => {
            let aspect = iw / ih;
            let dw = if h.touches_east() { delta.x } else { -delta.x };
            nw = (iw + dw * gain).max(MIN_LAYER_SIZE);
            nh = nw / aspect;
            if symmetric {
                nx = ix + (iw - nw) / 2.0;
                ny = iy + (ih - nh) / 2.0;
            } else {
                if h.touches_west() {
                    nx = ix + (iw - nw);
                }
                if h.touches_north() {
                    ny = iy + (ih - nh);
                }
            }
        }
        Handle::East | Handle::West => {
            let d = if handle == Handle::East { delta.x } else { -delta.x };
            nw = (iw + d * gain).max(MIN_LAYER_SIZE);
            if symmetric {
                nx = ix + (iw - nw) / 2.0;
            } else if handle == Handle::West {
                nx = ix + (iw - nw);
            }
        }
        _ => {
            let d = if handle == Handle::South { delta.y } else { -delta.y };
            nh = (ih + d * gain).max(MIN_LAYER_SIZE);
            if symmetric {
                ny = iy + (ih - nh) / 2.0;
            } else if handle == Handle::North {
                ny = iy + (ih - nh);
            }
        }
    }
    Rect::from_min_size(pos2(nx, ny), vec2(nw, nh))
}

/// Renders the layer at its display size: rounded clip, then the erasure
/// cut-out, then the feather matte.
pub fn build_composite(layer: &StagedLayer, erase_mask: Option<&GrayImage>) -> RgbaImage {
    let (w, h) = layer.display_size();
    let mut out = raster::resize_rgba(&layer.image, w, h);
    let full = Rect::from_min_size(Pos2::ZERO, vec2(w as f32, h as f32));

    let clip = raster::rounded_rect_mask(w, h, full, LAYER_CORNER_RADIUS);
    raster::multiply_alpha(&mut out, &clip);

    if let Some(mask) = erase_mask {
        let mask = raster::resize_gray(mask, w, h);
        raster::cut_alpha(&mut out, &mask);
    }

    if layer.feather > 0.0 {
        let f = layer.feather;
        let inset = full.shrink(f);
        let mut matte = GrayImage::new(w, h);
        if inset.is_positive() {
            matte = raster::rounded_rect_mask(w, h, inset, (LAYER_CORNER_RADIUS - f).max(0.0));
        }
        let matte = raster::blur_gray(&matte, f);
        raster::multiply_alpha(&mut out, &matte);
    }
    out
}

struct CompositeKey {
    image: Arc<RgbaImage>,
    mask: Option<Arc<GrayImage>>,
    feather: f32,
    size: (u32, u32),
}

impl CompositeKey {
    fn matches(&self, layer: &StagedLayer) -> bool {
        Arc::ptr_eq(&self.image, &layer.image)
            && match (&self.mask, &layer.mask_image) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
            && self.feather == layer.feather
            && self.size == layer.display_size()
    }
}

/// Caches the staged layer composite. A rebuild happens only when the image
/// or mask identity, feather, or display size changes, or while an erase
/// stroke is painting into a live mask.
#[derive(Default)]
pub struct LayerCompositor {
    key: Option<CompositeKey>,
    composite: Option<Arc<RgbaImage>>,
    version: u64,
}

impl LayerCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the composite for `layer`, rebuilding it if stale. Pass the
    /// in-progress erase buffer as `live_mask` during an erase stroke.
    pub fn composite(&mut self, layer: &StagedLayer, live_mask: Option<&GrayImage>) -> Arc<RgbaImage> {
        let fresh = live_mask.is_none() && self.key.as_ref().is_some_and(|k| k.matches(layer));
        if let (true, Some(composite)) = (fresh, &self.composite) {
            return Arc::clone(composite);
        }

        let mask = live_mask.or(layer.mask_image.as_deref());
        let composite = Arc::new(build_composite(layer, mask));
        self.version += 1;
        self.key = Some(CompositeKey {
            image: Arc::clone(&layer.image),
            mask: layer.mask_image.clone(),
            feather: layer.feather,
            size: layer.display_size(),
        });
        self.composite = Some(Arc::clone(&composite));
        composite
    }

    /// Increments on every rebuild
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.composite = None;
    }
}

impl std::fmt::Debug for LayerCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCompositor")
            .field("cached", &self.composite.is_some())
            .field("version", &self.version)
            .finish()
    }
}
