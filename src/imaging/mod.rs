//! Raster work behind `imagecomp` and `roundpic`

mod grid;
mod rounding;

pub use grid::{
    ComposeError, CompositionGrid, GridError, GridSpec, HorizontalAlign, Layout,
    TraversalOrder, VerticalAlign, compose,
};
pub use rounding::{CornerRadius, RadiusValue, round_corners};

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageResult};

/// Encoded output of a raster operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Accepts the command spellings `png`, `jpg` and `jpeg`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    /// Alpha used for the background when the command does not set one:
    /// opaque for JPEG, transparent for PNG.
    pub fn default_alpha(&self) -> u8 {
        match self {
            OutputFormat::Png => 0,
            OutputFormat::Jpeg => 255,
        }
    }

    /// Encode an image. JPEG output is written at quality 100 with the alpha
    /// channel dropped.
    pub fn encode(&self, image: DynamicImage) -> ImageResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            OutputFormat::Png => {
                image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
            }
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 100))?;
            }
        }
        Ok(buf)
    }
}

/// Decode a fetched image whose content type was already checked.
pub fn decode(bytes: &[u8], mime_type: &str) -> ImageResult<DynamicImage> {
    match mime_type {
        "image/png" => image::load_from_memory_with_format(bytes, ImageFormat::Png),
        "image/jpeg" => image::load_from_memory_with_format(bytes, ImageFormat::Jpeg),
        _ => image::load_from_memory(bytes),
    }
}
