//! Image processor: downscale wide images and post the result back.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::ProcessorError;
use crate::pipeline::registry::{FileProcessor, ProcessorRegistry};
use crate::pipeline::types::{DerivedFile, ProcessorInput, ProcessorOutput};

pub const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
pub const MIMETYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];
pub const DESCRIPTION: &str = "Resize and optimize images";

/// JPEG quality for re-encoded output.
const JPEG_QUALITY: u8 = 85;

/// Downscales images to a maximum width, preserving aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct ImageResizer {
    max_width: u32,
}

impl ImageResizer {
    pub fn new(max_width: u32) -> Self {
        Self {
            max_width: max_width.max(1),
        }
    }

    /// Target size for an image of the given dimensions.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width {
            return (width, height);
        }
        let scaled = (u64::from(height) * u64::from(self.max_width) / u64::from(width)).max(1);
        (self.max_width, scaled as u32)
    }
}

impl FileProcessor for ImageResizer {
    fn process(&self, input: &ProcessorInput) -> Result<Option<ProcessorOutput>, ProcessorError> {
        let img = image::load_from_memory(&input.content).map_err(|e| ProcessorError::Decode {
            format: "image".into(),
            reason: e.to_string(),
        })?;

        let (width, height) = img.dimensions();
        let (new_width, new_height) = self.target_size(width, height);
        let resized = if (new_width, new_height) == (width, height) {
            img
        } else {
            img.resize_exact(new_width, new_height, FilterType::Lanczos3)
        };

        let (content, extension) = if input.extension == "png" {
            (encode_png(&resized)?, "png")
        } else {
            (encode_jpeg(&resized)?, "jpg")
        };

        let file = DerivedFile {
            content,
            filename: format!("{}-resized.{extension}", input.stem()),
            title: Some(format!("Resized: {}", input.filename)),
        };
        let caption = format!(
            "Processed image: {}\nOriginal: {width}x{height}\n\
             Result: {new_width}x{new_height} (max {}px width)",
            input.filename, self.max_width
        );

        Ok(Some(ProcessorOutput::file(file, Some(caption))))
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ProcessorError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ProcessorError::Encode {
            format: "png".into(),
            reason: e.to_string(),
        })?;
    Ok(buffer)
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, ProcessorError> {
    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
        encoder.encode_image(&rgb).map_err(|e| ProcessorError::Encode {
            format: "jpeg".into(),
            reason: e.to_string(),
        })?;
    }
    Ok(buffer)
}

/// Register the image processor.
pub fn register(registry: &mut ProcessorRegistry, max_width: u32) {
    registry.register(
        EXTENSIONS.iter().copied(),
        MIMETYPES.iter().copied(),
        DESCRIPTION,
        Arc::new(ImageResizer::new(max_width)),
    );
}
