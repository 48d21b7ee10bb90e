//! CPU compositing primitives on `image` buffers. Colour buffers hold
//! straight (non-premultiplied) RGBA; grey buffers are coverage or alpha
//! masks where 255 means fully covered.

use egui::{Pos2, Rect};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, Rgba32FImage, RgbaImage};

use crate::geometry::{self, PixelRect};

/// Copies `rect` out of `src`. Pixels outside `src` come back transparent.
pub fn crop(src: &RgbaImage, rect: PixelRect) -> RgbaImage {
    let mut out = RgbaImage::new(rect.width, rect.height);
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let (sx, sy) = (rect.x + x as i64, rect.y + y as i64);
        if sx >= 0 && sy >= 0 && sx < sw && sy < sh {
            *px = *src.get_pixel(sx as u32, sy as u32);
        }
    }
    out
}

/// Straight-alpha source-over of one pixel with an extra opacity factor.
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f32) {
    let sa = src.0[3] as f32 / 255.0 * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let s = src.0[c] as f32;
        let d = dst.0[c] as f32;
        let v = (s * sa + d * da * (1.0 - sa)) / out_a;
        dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Source-over composites `src` onto `dst` with its top-left at `(x, y)`.
pub fn blend_over(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    for (sx, sy, px) in src.enumerate_pixels() {
        let (tx, ty) = (x + sx as i64, y + sy as i64);
        if tx < 0 || ty < 0 || tx >= dw || ty >= dh {
            continue;
        }
        blend_pixel(dst.get_pixel_mut(tx as u32, ty as u32), *px, opacity);
    }
}

/// Calls `f(x, y)` for every pixel of a `width` x `height` raster whose
/// centre lies inside `polygon` (even-odd rule).
pub fn for_each_pixel_in_polygon(
    polygon: &[Pos2],
    width: u32,
    height: u32,
    mut f: impl FnMut(u32, u32),
) {
    if polygon.len() < 3 {
        return;
    }
    let bounds = geometry::polygon_bounds(polygon);
    let y0 = (bounds.min.y - 0.5).ceil().max(0.0) as u32;
    let y1 = ((bounds.max.y - 0.5).floor() + 1.0).clamp(0.0, height as f32) as u32;
    for y in y0..y1 {
        let xs = geometry::scanline_crossings(polygon, y as f32 + 0.5);
        for span in xs.chunks_exact(2) {
            // Pixel x is inside when span[0] <= x + 0.5 < span[1].
            let start = (span[0] - 0.5).ceil().max(0.0) as u32;
            let end = (span[1] - 0.5).ceil().clamp(0.0, width as f32) as u32;
            for x in start..end {
                f(x, y);
            }
        }
    }
}

/// Writes `value` into every pixel of `dst` covered by `polygon`.
pub fn fill_polygon(dst: &mut GrayImage, polygon: &[Pos2], value: u8) {
    let (w, h) = dst.dimensions();
    for_each_pixel_in_polygon(polygon, w, h, |x, y| dst.put_pixel(x, y, Luma([value])));
}

/// Source-over fills `polygon` with a flat colour.
pub fn fill_polygon_rgba(dst: &mut RgbaImage, polygon: &[Pos2], color: Rgba<u8>) {
    let (w, h) = dst.dimensions();
    for_each_pixel_in_polygon(polygon, w, h, |x, y| {
        blend_pixel(dst.get_pixel_mut(x, y), color, 1.0)
    });
}

/// Destination-out with an opaque polygon: covered pixels become transparent.
pub fn cut_polygon(dst: &mut RgbaImage, polygon: &[Pos2]) {
    let (w, h) = dst.dimensions();
    for_each_pixel_in_polygon(polygon, w, h, |x, y| dst.put_pixel(x, y, Rgba([0, 0, 0, 0])));
}

pub fn fill_rgba(dst: &mut RgbaImage, color: Rgba<u8>) {
    for px in dst.pixels_mut() {
        blend_pixel(px, color, 1.0);
    }
}

/// Binary coverage of a rounded rectangle sampled at pixel centres.
pub fn rounded_rect_mask(width: u32, height: u32, rect: Rect, radius: f32) -> GrayImage {
    let r = radius.max(0.0).min(rect.width() / 2.0).min(rect.height() / 2.0);
    GrayImage::from_fn(width, height, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        let inside_rect =
            px >= rect.min.x && px < rect.max.x && py >= rect.min.y && py < rect.max.y;
        if !inside_rect {
            return Luma([0]);
        }
        let cx = px.clamp(rect.min.x + r, rect.max.x - r);
        let cy = py.clamp(rect.min.y + r, rect.max.y - r);
        let (dx, dy) = (px - cx, py - cy);
        if dx * dx + dy * dy <= r * r {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn mul_u8(a: u8, b: u8) -> u8 {
    ((a as u32 * b as u32 + 127) / 255) as u8
}

/// Destination-in: scales alpha by `mask`. Sizes must match.
pub fn multiply_alpha(img: &mut RgbaImage, mask: &GrayImage) {
    debug_assert_eq!(img.dimensions(), mask.dimensions());
    for (px, m) in img.pixels_mut().zip(mask.pixels()) {
        px.0[3] = mul_u8(px.0[3], m.0[0]);
    }
}

/// Destination-out with a grey mask: alpha is scaled by `1 - mask`.
pub fn cut_alpha(img: &mut RgbaImage, mask: &GrayImage) {
    debug_assert_eq!(img.dimensions(), mask.dimensions());
    for (px, m) in img.pixels_mut().zip(mask.pixels()) {
        px.0[3] = mul_u8(px.0[3], 255 - m.0[0]);
    }
}

/// Resamples to an exact size; returns a clone when the size already matches.
pub fn resize_rgba(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        img.clone()
    } else {
        imageops::resize(img, width.max(1), height.max(1), FilterType::Triangle)
    }
}

pub fn resize_gray(img: &GrayImage, width: u32, height: u32) -> GrayImage {
    if img.dimensions() == (width, height) {
        img.clone()
    } else {
        imageops::resize(img, width.max(1), height.max(1), FilterType::Triangle)
    }
}

/// Transparent border of `pad` pixels around `img`.
pub fn pad(img: &RgbaImage, pad: u32) -> RgbaImage {
    let mut out = RgbaImage::new(img.width() + pad * 2, img.height() + pad * 2);
    imageops::replace(&mut out, img, pad as i64, pad as i64);
    out
}

/// 1-D Gaussian kernel reaching `extent` pixels each side (sigma = extent / 3).
fn gaussian_kernel(extent: f32) -> Vec<f32> {
    let radius = extent.ceil().max(0.0) as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = extent / 3.0;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..radius * 2 + 1)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Separable Gaussian over interleaved f32 channels. Samples outside the
/// buffer read as zero.
fn blur_channels(data: &[f32], width: usize, height: usize, channels: usize, extent: f32) -> Vec<f32> {
    let kernel = gaussian_kernel(extent);
    let radius = (kernel.len() / 2) as isize;
    let mut horizontal = vec![0.0f32; data.len()];
    for y in 0..height {
        for x in 0..width {
            for (ki, kv) in kernel.iter().enumerate() {
                let sx = x as isize + ki as isize - radius;
                if sx < 0 || sx >= width as isize {
                    continue;
                }
                let src = (y * width + sx as usize) * channels;
                let dst = (y * width + x) * channels;
                for c in 0..channels {
                    horizontal[dst + c] += data[src + c] * kv;
                }
            }
        }
    }
    let mut out = vec![0.0f32; data.len()];
    for y in 0..height {
        for x in 0..width {
            for (ki, kv) in kernel.iter().enumerate() {
                let sy = y as isize + ki as isize - radius;
                if sy < 0 || sy >= height as isize {
                    continue;
                }
                let src = (sy as usize * width + x) * channels;
                let dst = (y * width + x) * channels;
                for c in 0..channels {
                    out[dst + c] += horizontal[src + c] * kv;
                }
            }
        }
    }
    out
}

pub fn blur_gray(img: &GrayImage, extent: f32) -> GrayImage {
    if extent <= 0.0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let data: Vec<f32> = img.as_raw().iter().map(|v| *v as f32).collect();
    let blurred = blur_channels(&data, w as usize, h as usize, 1, extent);
    let raw = blurred.iter().map(|v| v.round().clamp(0.0, 255.0) as u8).collect();
    GrayImage::from_raw(w, h, raw).unwrap_or_else(|| img.clone())
}

/// Blurs colour with premultiplied alpha so transparent surroundings do not
/// darken the edges. Runs `imageops::fast_blur`, whose cost does not grow
/// with `extent`.
pub fn blur_rgba(img: &RgbaImage, extent: f32) -> RgbaImage {
    if extent <= 0.0 {
        return img.clone();
    }
    let premultiplied = Rgba32FImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        Rgba([r as f32 * alpha, g as f32 * alpha, b as f32 * alpha, a as f32])
    });
    let blurred = imageops::fast_blur(&premultiplied, extent / 3.0);
    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = blurred.get_pixel(x, y).0;
        let unpremultiply = |v: f32| {
            if a > 0.0 {
                (v * 255.0 / a).round().clamp(0.0, 255.0) as u8
            } else {
                0
            }
        };
        Rgba([
            unpremultiply(r),
            unpremultiply(g),
            unpremultiply(b),
            a.round().clamp(0.0, 255.0) as u8,
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    #[test]
    fn test_crop_outside_is_transparent() {
        let src = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let out = crop(&src, PixelRect { x: 8, y: 8, width: 4, height: 4 });
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(3, 3).0[3], 0);
    }

    #[test]
    fn test_blend_over_opaque_replaces() {
        let mut dst = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let src = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        blend_over(&mut dst, &src, 1, 1, 1.0);
        assert_eq!(dst.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(dst.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_half_alpha_blend() {
        let mut px = Rgba([0, 0, 0, 255]);
        blend_pixel(&mut px, Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(px.0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_polygon_fill_matches_point_test() {
        let poly = [pos2(2.0, 1.0), pos2(17.0, 4.0), pos2(6.0, 15.0)];
        let mut mask = GrayImage::new(20, 20);
        fill_polygon(&mut mask, &poly, 255);
        for (x, y, v) in mask.enumerate_pixels() {
            let inside = geometry::point_in_polygon(pos2(x as f32 + 0.5, y as f32 + 0.5), &poly);
            assert_eq!(v.0[0] == 255, inside, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn test_rounded_rect_corners() {
        let m = rounded_rect_mask(50, 50, Rect::from_min_size(pos2(0.0, 0.0), vec2(50.0, 50.0)), 12.0);
        assert_eq!(m.get_pixel(0, 0).0[0], 0);
        assert_eq!(m.get_pixel(25, 25).0[0], 255);
        assert_eq!(m.get_pixel(25, 0).0[0], 255);
    }

    #[test]
    fn test_cut_and_multiply_alpha() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 200]));
        let mask = GrayImage::from_raw(2, 1, vec![255, 0]).unwrap();
        cut_alpha(&mut img, &mask);
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(1, 0).0[3], 200);
        multiply_alpha(&mut img, &GrayImage::from_raw(2, 1, vec![255, 128]).unwrap());
        assert_eq!(img.get_pixel(1, 0).0[3], 100);
    }

    #[test]
    fn test_blur_preserves_flat_interior() {
        let mut img = GrayImage::new(40, 40);
        for y in 5..35 {
            for x in 5..35 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let blurred = blur_gray(&img, 6.0);
        assert_eq!(blurred.get_pixel(20, 20).0[0], 255);
        assert!(blurred.get_pixel(5, 20).0[0] < 255);
        assert_eq!(blurred.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn test_rgba_blur_keeps_colour_at_soft_edges() {
        let img = pad(&RgbaImage::from_pixel(10, 10, Rgba([200, 40, 40, 255])), 6);
        let blurred = blur_rgba(&img, 6.0);
        let edge = blurred.get_pixel(3, 11);
        assert!(edge.0[3] > 0 && edge.0[3] < 255);
        assert!((edge.0[0] as i32 - 200).abs() <= 2);
    }
}
