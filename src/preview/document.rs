use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdfium_render::prelude::*;
use std::io::Cursor;

use crate::error::{AppError, Result};
use crate::preview::image::square_thumb;
use crate::preview::watermark::Watermarker;
use crate::preview::{Artifact, DerivedVariants};

/// Sampled pages are rasterized at this resolution
const RASTER_DPI: f32 = 150.0;
/// The thumbnail page is rendered a little denser before the square rule
const THUMB_DPI: f32 = 200.0;

const THUMB_SIZE: u32 = 512;

/// Build a preview PDF from a sampled subset of pages, each rasterized
/// and watermarked so the original vector/text content is never exposed,
/// plus a thumbnail from the preview's first page. Fails loudly when the
/// rendering library is missing; an un-watermarked original must never
/// be substituted.
pub fn derive(watermark: &Watermarker, data: &[u8]) -> Result<DerivedVariants> {
    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        AppError::Derivation(format!("PDF rendering support unavailable: {}", e))
    })?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| AppError::Derivation(format!("Failed to open PDF: {}", e)))?;

    let total = document.pages().len() as usize;
    if total == 0 {
        return Err(AppError::Derivation("PDF has no pages".to_string()));
    }

    let count = sample_count(total);
    let mut sampled_pages = Vec::with_capacity(count);
    for idx in sample_indices(total, count) {
        let page = document
            .pages()
            .get(idx as u16)
            .map_err(|e| AppError::Derivation(format!("Failed to load page {}: {}", idx, e)))?;
        let target_width = (page.width().value * RASTER_DPI / 72.0).round() as i32;
        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().set_target_width(target_width))
            .map_err(|e| AppError::Derivation(format!("Failed to render page {}: {}", idx, e)))?;

        let mut raster = bitmap.as_image().to_rgba8();
        watermark.apply(&mut raster);

        let (width, height) = raster.dimensions();
        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(raster).to_rgb8())
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .map_err(|e| AppError::Derivation(format!("Failed to encode page: {}", e)))?;
        sampled_pages.push((jpeg.into_inner(), width, height));
    }

    let pdf_bytes = assemble_pdf(&sampled_pages)?;

    // Thumbnail comes from the already-watermarked preview document
    let thumb_png = {
        let preview_doc = pdfium
            .load_pdf_from_byte_slice(&pdf_bytes, None)
            .map_err(|e| AppError::Derivation(format!("Failed to reopen preview PDF: {}", e)))?;
        let first = preview_doc
            .pages()
            .get(0)
            .map_err(|e| AppError::Derivation(format!("Failed to load preview page: {}", e)))?;
        let target_width = (first.width().value * THUMB_DPI / 72.0).round() as i32;
        let bitmap = first
            .render_with_config(&PdfRenderConfig::new().set_target_width(target_width))
            .map_err(|e| AppError::Derivation(format!("Failed to render thumbnail: {}", e)))?;

        let thumb = square_thumb(&bitmap.as_image(), THUMB_SIZE);
        let mut thumb_png = Cursor::new(Vec::new());
        thumb
            .write_to(&mut thumb_png, ImageFormat::Png)
            .map_err(|e| AppError::Derivation(format!("Failed to encode thumbnail: {}", e)))?;
        thumb_png
    };

    Ok(DerivedVariants {
        thumbnail: Some(Artifact {
            bytes: thumb_png.into_inner(),
            content_type: "image/png".to_string(),
        }),
        preview: Artifact {
            bytes: pdf_bytes,
            content_type: "application/pdf".to_string(),
        },
    })
}

/// clamp(floor(20% of page count), 1, 5)
pub(crate) fn sample_count(total: usize) -> usize {
    ((total as f64 * 0.2) as usize).clamp(1, 5)
}

/// Evenly spaced page indices: floor(i * total / count), capped at the
/// last page
pub(crate) fn sample_indices(total: usize, count: usize) -> Vec<usize> {
    (0..count).map(|i| (i * total / count).min(total - 1)).collect()
}

/// Assemble a new PDF whose pages are image-backed only. Each entry is
/// (jpeg bytes, width px, height px); pixel dimensions double as the
/// page media box.
fn assemble_pdf(pages: &[(Vec<u8>, u32, u32)]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for (jpeg, width, height) in pages {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => *width as i64,
                "Height" => *height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
                "Filter" => "DCTDecode",
            },
            jpeg.clone(),
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (*width as i64).into(),
                        0i64.into(),
                        0i64.into(),
                        (*height as i64).into(),
                        0i64.into(),
                        0i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| AppError::Derivation(format!("Failed to encode content: {}", e)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        });

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0i64.into(),
                0i64.into(),
                (*width as i64).into(),
                (*height as i64).into(),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut Cursor::new(&mut buf))
        .map_err(|e| AppError::Derivation(format!("Failed to write preview PDF: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_is_clamped_between_one_and_five() {
        assert_eq!(sample_count(1), 1);
        assert_eq!(sample_count(4), 1);
        assert_eq!(sample_count(10), 2);
        assert_eq!(sample_count(25), 5);
        assert_eq!(sample_count(500), 5);
    }

    #[test]
    fn indices_are_strictly_increasing_and_in_range() {
        for total in 1..=80 {
            let count = sample_count(total);
            let idxs = sample_indices(total, count);
            assert_eq!(idxs.len(), count);
            assert!(idxs.windows(2).all(|w| w[0] < w[1]), "total={}", total);
            assert!(idxs.iter().all(|&i| i < total), "total={}", total);
        }
    }

    #[test]
    fn indices_are_evenly_spaced() {
        assert_eq!(sample_indices(100, 5), vec![0, 20, 40, 60, 80]);
        assert_eq!(sample_indices(10, 2), vec![0, 5]);
        assert_eq!(sample_indices(3, 1), vec![0]);
    }

    #[test]
    fn assembled_pdf_parses_with_expected_page_count() {
        let jpeg = {
            let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]));
            let mut buf = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(img)
                .write_to(&mut buf, ImageFormat::Jpeg)
                .unwrap();
            buf.into_inner()
        };
        let pages = vec![(jpeg.clone(), 8, 8), (jpeg, 8, 8)];
        let bytes = assemble_pdf(&pages).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
