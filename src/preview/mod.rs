pub mod audio;
pub mod document;
pub mod image;
pub mod watermark;

pub use watermark::Watermarker;

use crate::config::WatermarkConfig;
use crate::error::Result;

/// Declared media class of an upload. Dispatch is by declaration, not
/// content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Audio,
    Document,
    Other,
}

impl MediaClass {
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            MediaClass::Image
        } else if content_type.starts_with("audio/") {
            MediaClass::Audio
        } else if content_type == "application/pdf" {
            MediaClass::Document
        } else {
            MediaClass::Other
        }
    }
}

/// A derived, reduced-fidelity artifact
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Derivation output: an optional thumbnail plus a preview
#[derive(Debug, Clone)]
pub struct DerivedVariants {
    pub thumbnail: Option<Artifact>,
    pub preview: Artifact,
}

/// Stateless thumbnail/preview derivation for uploaded media. Built once
/// at startup (the watermark font loads eagerly) and shared across
/// requests.
pub struct VariantDeriver {
    watermark: Watermarker,
}

impl VariantDeriver {
    pub fn new(config: &WatermarkConfig) -> Result<Self> {
        Ok(Self {
            watermark: Watermarker::load(config)?,
        })
    }

    /// Produce (thumbnail, preview) for the declared media class.
    /// Unrecognized classes pass the original bytes through as the
    /// preview with no thumbnail; uploads never fail solely because no
    /// preview could be produced for an unknown type.
    pub fn derive(&self, data: &[u8], content_type: &str) -> Result<DerivedVariants> {
        match MediaClass::from_content_type(content_type) {
            MediaClass::Image => image::derive(&self.watermark, data),
            MediaClass::Audio => audio::derive(data),
            MediaClass::Document => document::derive(&self.watermark, data),
            MediaClass::Other => Ok(DerivedVariants {
                thumbnail: None,
                preview: Artifact {
                    bytes: data.to_vec(),
                    content_type: content_type.to_string(),
                },
            }),
        }
    }
}
