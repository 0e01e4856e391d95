//! The two read-back operations on a stored file: one attribute as text,
//! and frame zero as an encoded raster.

use std::io::Cursor;
use std::path::Path;

use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{DicomObject, Tag};
use crate::parser::parse_file;
use crate::pixel::decode_frames;
use crate::resample::{resize, ResampleFilter};
use crate::resolver::{find_element, resolve_name};
use crate::window::DisplayParameters;
use crate::{CommonResult, DicomError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub filter: ResampleFilter,
    pub format: OutputFormat,
    pub jpeg_quality: u8,
    /// Decode every frame, not just frame zero, and fail on the first bad one.
    pub validate_all_frames: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: 512,
            height: 512,
            filter: ResampleFilter::Lanczos3,
            format: OutputFormat::Png,
            jpeg_quality: 100,
            validate_all_frames: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderValue {
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Reads the attribute `name` from the file at `path`. The name is
/// resolved before the file is opened.
pub fn extract_header(path: impl AsRef<Path>, name: &str) -> CommonResult<HeaderValue> {
    let tag = resolve_name(name)?;
    let value = read_attribute(path, tag)?;
    Ok(HeaderValue {
        tag: name.to_string(),
        value,
    })
}

pub fn read_attribute(path: impl AsRef<Path>, tag: Tag) -> CommonResult<String> {
    let object = parse_file(path)?;
    let element = find_element(&object.dataset, tag)?;
    Ok(element.value.to_display_string())
}

/// Decodes frame zero, maps it for display and scales it to the output size.
pub fn render_first_frame(
    object: &DicomObject,
    options: &RenderOptions,
) -> CommonResult<DynamicImage> {
    let mut frames = decode_frames(object)?;
    let display = DisplayParameters::from_dataset(&object.dataset, frames.description());

    let first = frames
        .next()
        .ok_or_else(|| DicomError::frame(0, "pixel data holds no frames"))??;

    if options.validate_all_frames {
        for frame in frames {
            frame?;
        }
    }

    let image = display.to_display(first.image);
    Ok(resize(&image, options.width, options.height, options.filter))
}

pub fn encode_image(image: &DynamicImage, format: OutputFormat, jpeg_quality: u8) -> CommonResult<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Png => image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(DicomError::Encode)?,
        OutputFormat::Jpeg => image
            .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, jpeg_quality))
            .map_err(DicomError::Encode)?,
    }
    Ok(bytes)
}

pub fn convert_file(path: impl AsRef<Path>, options: &RenderOptions) -> CommonResult<RenderedImage> {
    let object = parse_file(path)?;
    let image = render_first_frame(&object, options)?;
    let bytes = encode_image(&image, options.format, options.jpeg_quality)?;

    debug!(
        width = image.width(),
        height = image.height(),
        bytes = bytes.len(),
        content_type = options.format.content_type(),
        "rendered frame zero"
    );

    Ok(RenderedImage {
        bytes,
        content_type: options.format.content_type(),
    })
}
