use ab_glyph::{FontVec, PxScale};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use std::path::Path;

use crate::config::WatermarkConfig;
use crate::error::{AppError, Result};

/// Stamp color: translucent dark gray
const STAMP_FILL: Rgba<u8> = Rgba([64, 64, 64, 160]);

/// System font locations tried when no font is configured
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Renders the repeating diagonal brand stamp over preview canvases.
/// Previews must be visibly attributable; a missing font is a loud
/// failure, never a silent skip.
pub struct Watermarker {
    text: String,
    font: FontVec,
}

impl Watermarker {
    pub fn load(config: &WatermarkConfig) -> Result<Self> {
        let path = config
            .font_path
            .as_deref()
            .filter(|p| Path::new(p).exists())
            .or_else(|| FONT_CANDIDATES.iter().copied().find(|p| Path::new(p).exists()))
            .ok_or_else(|| {
                AppError::Derivation(
                    "No watermark font found; set watermark.font_path".to_string(),
                )
            })?;

        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| AppError::Derivation(format!("Invalid font file: {}", path)))?;

        tracing::info!("Watermark font loaded from {}", path);
        Ok(Self {
            text: config.text.clone(),
            font,
        })
    }

    /// Composite the tiled 45-degree stamp over the whole canvas
    pub fn apply(&self, base: &mut RgbaImage) {
        let (width, height) = base.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        let font_size = (width.min(height) as f32 * 0.05).max(12.0);
        let scale = PxScale::from(font_size);
        let (text_w, text_h) = text_size(scale, &self.font, &self.text);
        let padding = (font_size * 0.2).ceil() as u32;
        let stamp_w = text_w + 2 * padding;
        let stamp_h = text_h + 2 * padding;

        let (rot_w, rot_h) = rotated_bbox(stamp_w, stamp_h);
        let step = tile_pitch(stamp_w, stamp_h) as i64;

        // Draw the stamp centered on a square canvas that can hold it at
        // any rotation, then rotate once and reuse the tile everywhere
        let diag = ((stamp_w as f32).hypot(stamp_h as f32)).ceil() as u32 + 2;
        let mut tile = RgbaImage::new(diag, diag);
        draw_text_mut(
            &mut tile,
            STAMP_FILL,
            ((diag - stamp_w) / 2 + padding) as i32,
            ((diag - stamp_h) / 2 + padding) as i32,
            scale,
            &self.font,
            &self.text,
        );
        let rotated = rotate_about_center(
            &tile,
            std::f32::consts::FRAC_PI_4,
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        );

        let half = diag as i64 / 2;
        let mut y = -(rot_h as i64);
        while y < height as i64 + rot_h as i64 {
            let mut x = -(rot_w as i64);
            while x < width as i64 + rot_w as i64 {
                imageops::overlay(base, &rotated, x - half, y - half);
                x += step;
            }
            y += step;
        }
    }
}

/// Axis-aligned bounding box of a w x h rectangle rotated 45 degrees
pub(crate) fn rotated_bbox(w: u32, h: u32) -> (u32, u32) {
    let c = std::f32::consts::FRAC_1_SQRT_2;
    let edge = ((w as f32) * c + (h as f32) * c).ceil() as u32;
    (edge, edge)
}

/// Tile pitch derived from the rotated bounding box, so tiling stays
/// gap-free for arbitrary brand strings and canvas sizes
pub(crate) fn tile_pitch(w: u32, h: u32) -> u32 {
    let (rw, rh) = rotated_bbox(w, h);
    ((rw.max(rh) as f32) * 1.2).ceil().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_bbox_is_square_at_45_degrees() {
        let (rw, rh) = rotated_bbox(100, 20);
        assert_eq!(rw, rh);
        // diagonal projection: (100 + 20) / sqrt(2) ~= 84.9
        assert_eq!(rw, 85);
    }

    #[test]
    fn pitch_exceeds_rotated_edge() {
        for (w, h) in [(40, 12), (300, 28), (1200, 90)] {
            let (rw, rh) = rotated_bbox(w, h);
            let pitch = tile_pitch(w, h);
            assert!(pitch > rw.max(rh), "pitch must clear the stamp");
        }
    }

    #[test]
    fn pitch_grows_with_text_width() {
        assert!(tile_pitch(200, 30) > tile_pitch(100, 30));
    }

    #[test]
    fn apply_marks_pixels_when_font_available() {
        let Ok(wm) = Watermarker::load(&WatermarkConfig::default()) else {
            // no system font on this machine; geometry is covered above
            return;
        };
        let mut canvas = RgbaImage::from_pixel(400, 300, Rgba([255, 255, 255, 255]));
        wm.apply(&mut canvas);
        let touched = canvas.pixels().filter(|p| p.0 != [255, 255, 255, 255]).count();
        assert!(touched > 0, "watermark should alter the canvas");
    }
}
