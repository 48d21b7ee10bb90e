//! Turns the selection, its masks and the current document raster into the
//! payload sent for regeneration.

use std::sync::Arc;

use egui::{Pos2, pos2};
use image::{GrayImage, Rgba, RgbaImage};

use crate::geometry::{self, SelectionBox};
use crate::mask::MaskObject;
use crate::raster;

/// Appended to the prompt when masked pieces were moved, rotated or scaled.
pub const TRANSFORM_PROMPT_SUFFIX: &str = ". The image contains a manually moved object and a missing region. Please seamlessly blend the moved object into its new position, correcting lighting, shadows, and removing any rough cutout edges or background artifacts. Also, fill in the missing background region naturally.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Regenerate the whole region from the prompt
    Region,
    /// Regenerate only where the binary mask is white
    PaintMask,
    /// The region already has pieces cut out and pasted elsewhere; the
    /// service blends them in and fills the holes
    CutAndPaste,
}

#[derive(Debug, Clone)]
pub struct RegionRequest {
    pub mode: RequestMode,
    /// Crop of the document at the floored selection, prepared for `mode`
    pub image: RgbaImage,
    /// White marks pixels to regenerate. Present only in `PaintMask` mode.
    pub mask: Option<GrayImage>,
    pub prompt: String,
    pub reference_images: Vec<Arc<RgbaImage>>,
    /// The selection as it was when the request was built
    pub region: SelectionBox,
}

/// True if a request may be built: something to say, or something moved.
pub fn can_generate(prompt: &str, has_transforms: bool) -> bool {
    !prompt.trim().is_empty() || has_transforms
}

/// Builds the request for `selection`. Returns `None` when there is nothing
/// to generate or the floored region is empty.
pub fn build_region_request(
    document: &RgbaImage,
    selection: &SelectionBox,
    masks: &[MaskObject],
    prompt: &str,
    reference_images: &[Arc<RgbaImage>],
) -> Option<RegionRequest> {
    let has_transforms = masks.iter().any(MaskObject::is_transformed);
    if !can_generate(prompt, has_transforms) {
        return None;
    }
    let region = selection.floored();
    if region.width == 0 || region.height == 0 {
        return None;
    }

    let original = raster::crop(document, region);
    let (mode, image, mask, prompt) = if has_transforms {
        let image = cut_and_paste(&original, masks);
        (RequestMode::CutAndPaste, image, None, format!("{prompt}{TRANSFORM_PROMPT_SUFFIX}"))
    } else if !masks.is_empty() {
        let mask = paint_mask(region.width, region.height, masks);
        (RequestMode::PaintMask, original, Some(mask), prompt.to_owned())
    } else {
        (RequestMode::Region, original, None, prompt.to_owned())
    };

    log::debug!(
        "Built {:?} request for {}x{} region at ({}, {})",
        mode,
        region.width,
        region.height,
        region.x,
        region.y
    );

    Some(RegionRequest {
        mode,
        image,
        mask,
        prompt,
        reference_images: reference_images.to_vec(),
        region: *selection,
    })
}

/// Untransformed outline of `mask` in crop pixel space.
fn crop_outline(mask: &MaskObject) -> Vec<Pos2> {
    let c = mask.center().to_vec2();
    mask.points().iter().map(|p| *p + c).collect()
}

/// Binary mask: white inside any mask outline, black elsewhere.
pub fn paint_mask(width: u32, height: u32, masks: &[MaskObject]) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    for mask in masks {
        raster::fill_polygon(&mut out, &crop_outline(mask), 255);
    }
    out
}

/// Extracts every masked piece from `original`, cuts all outlines out of the
/// base, then pastes each piece back under its transform.
pub fn cut_and_paste(original: &RgbaImage, masks: &[MaskObject]) -> RgbaImage {
    let (w, h) = original.dimensions();

    let pieces: Vec<RgbaImage> = masks
        .iter()
        .map(|mask| {
            let mut piece = RgbaImage::new(w, h);
            raster::for_each_pixel_in_polygon(&crop_outline(mask), w, h, |x, y| {
                piece.put_pixel(x, y, *original.get_pixel(x, y));
            });
            piece
        })
        .collect();

    let mut base = original.clone();
    for mask in masks {
        raster::cut_polygon(&mut base, &crop_outline(mask));
    }

    // Crop space is the selection's own frame, so use a zero-origin selection.
    let frame = SelectionBox::new(0.0, 0.0, w as f32, h as f32);
    for (mask, piece) in masks.iter().zip(&pieces) {
        paste_piece(&mut base, piece, mask, &frame);
    }
    base
}

fn paste_piece(base: &mut RgbaImage, piece: &RgbaImage, mask: &MaskObject, frame: &SelectionBox) {
    let (w, h) = base.dimensions();
    let bounds = geometry::polygon_bounds(&mask.transformed_outline(frame));
    if !bounds.is_positive() {
        return;
    }
    let x0 = bounds.min.x.floor().max(0.0) as u32;
    let y0 = bounds.min.y.floor().max(0.0) as u32;
    let x1 = (bounds.max.x.ceil().max(0.0) as u32).min(w);
    let y1 = (bounds.max.y.ceil().max(0.0) as u32).min(h);
    let centre = mask.center().to_vec2();

    for y in y0..y1 {
        for x in x0..x1 {
            let local = mask.document_to_local(pos2(x as f32 + 0.5, y as f32 + 0.5), frame);
            let src = local + centre;
            if src.x < 0.0 || src.y < 0.0 {
                continue;
            }
            let (sx, sy) = (src.x.floor() as u32, src.y.floor() as u32);
            if sx >= w || sy >= h {
                continue;
            }
            let px: Rgba<u8> = *piece.get_pixel(sx, sy);
            if px.0[3] > 0 {
                raster::blend_pixel(base.get_pixel_mut(x, y), px, 1.0);
            }
        }
    }
}
