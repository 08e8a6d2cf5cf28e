use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::error::{AppError, Result};
use crate::preview::watermark::Watermarker;
use crate::preview::{Artifact, DerivedVariants};

/// Thumbnails are always exactly this square
pub(crate) const THUMB_SIZE: u32 = 512;
/// Previews keep their aspect ratio with the longer edge bounded
pub(crate) const PREVIEW_MAX_EDGE: u32 = 800;

pub fn derive(watermark: &Watermarker, data: &[u8]) -> Result<DerivedVariants> {
    let format = image::guess_format(data)
        .map_err(|e| AppError::Derivation(format!("Unrecognized image data: {}", e)))?;
    let img = image::load_from_memory(data)
        .map_err(|e| AppError::Derivation(format!("Failed to decode image: {}", e)))?;

    let mut thumb = square_thumb(&img, THUMB_SIZE).to_rgba8();
    watermark.apply(&mut thumb);
    let (thumb_bytes, thumb_ct) = encode(&DynamicImage::ImageRgba8(thumb), format)?;

    let mut preview = bounded_preview(&img, PREVIEW_MAX_EDGE).to_rgba8();
    watermark.apply(&mut preview);
    let (preview_bytes, preview_ct) = encode(&DynamicImage::ImageRgba8(preview), format)?;

    Ok(DerivedVariants {
        thumbnail: Some(Artifact {
            bytes: thumb_bytes,
            content_type: thumb_ct,
        }),
        preview: Artifact {
            bytes: preview_bytes,
            content_type: preview_ct,
        },
    })
}

/// Fixed square: upscale (preserving aspect, Lanczos) until both axes
/// reach `size`, then center-crop to exactly `size` x `size`
pub(crate) fn square_thumb(img: &DynamicImage, size: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let scaled = if w < size || h < size {
        let scale = size as f32 / w.min(h) as f32;
        let nw = ((w as f32 * scale).round() as u32).max(size);
        let nh = ((h as f32 * scale).round() as u32).max(size);
        img.resize_exact(nw, nh, FilterType::Lanczos3)
    } else {
        img.clone()
    };

    let left = (scaled.width() - size) / 2;
    let top = (scaled.height() - size) / 2;
    scaled.crop_imm(left, top, size, size)
}

/// Proportional downscale so the longer edge fits `max_edge`; smaller
/// images pass through untouched (previews are never upscaled)
pub(crate) fn bounded_preview(img: &DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width() > max_edge || img.height() > max_edge {
        img.resize(max_edge, max_edge, FilterType::Lanczos3)
    } else {
        img.clone()
    }
}

/// Re-encode in the source format; JPEG has no alpha channel, and
/// formats we cannot encode fall back to PNG
pub(crate) fn encode(img: &DynamicImage, format: ImageFormat) -> Result<(Vec<u8>, String)> {
    let mut buf = Cursor::new(Vec::new());

    if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(|e| AppError::Derivation(format!("Failed to encode JPEG: {}", e)))?;
        return Ok((buf.into_inner(), "image/jpeg".to_string()));
    }

    match img.write_to(&mut buf, format) {
        Ok(()) => Ok((buf.into_inner(), format.to_mime_type().to_string())),
        Err(_) => {
            let mut png = Cursor::new(Vec::new());
            img.write_to(&mut png, ImageFormat::Png)
                .map_err(|e| AppError::Derivation(format!("Failed to encode PNG: {}", e)))?;
            Ok((png.into_inner(), "image/png".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn thumb_is_exact_square_for_large_landscape() {
        let t = square_thumb(&solid(2000, 900), 512);
        assert_eq!((t.width(), t.height()), (512, 512));
    }

    #[test]
    fn thumb_is_exact_square_for_small_portrait() {
        let t = square_thumb(&solid(120, 300), 512);
        assert_eq!((t.width(), t.height()), (512, 512));
    }

    #[test]
    fn thumb_is_exact_square_when_one_axis_below_size() {
        let t = square_thumb(&solid(700, 256), 512);
        assert_eq!((t.width(), t.height()), (512, 512));
    }

    #[test]
    fn large_source_is_only_cropped_not_scaled() {
        // a 600x600 source exceeds 512 on both axes, so the crop keeps
        // original pixels
        let t = square_thumb(&solid(600, 600), 512);
        assert_eq!((t.width(), t.height()), (512, 512));
    }

    #[test]
    fn preview_bounds_longer_edge() {
        let p = bounded_preview(&solid(1600, 400), 800);
        assert_eq!(p.width(), 800);
        assert_eq!(p.height(), 200);
    }

    #[test]
    fn preview_never_upscales() {
        let p = bounded_preview(&solid(300, 200), 800);
        assert_eq!((p.width(), p.height()), (300, 200));
    }

    #[test]
    fn jpeg_encode_drops_alpha() {
        let (bytes, ct) = encode(&solid(16, 16), ImageFormat::Jpeg).unwrap();
        assert_eq!(ct, "image/jpeg");
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn png_round_trip_keeps_dimensions() {
        let (bytes, ct) = encode(&solid(33, 17), ImageFormat::Png).unwrap();
        assert_eq!(ct, "image/png");
        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (33, 17));
    }
}
