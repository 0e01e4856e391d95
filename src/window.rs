//! Maps decoded frames to 8-bit display values.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Primitive};

use crate::dictionary::tags;
use crate::model::DataSet;
use crate::pixel::{ImageDescription, PhotometricInterpretation};

/// Modality rescale and VOI window read from the data set.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayParameters {
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    /// Center and width, when the data set carries a usable window.
    pub window: Option<(f64, f64)>,
    pub invert: bool,
    pub signed: bool,
}

impl Default for DisplayParameters {
    fn default() -> Self {
        DisplayParameters {
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
            window: None,
            invert: false,
            signed: false,
        }
    }
}

impl DisplayParameters {
    pub fn from_dataset(dataset: &DataSet, description: &ImageDescription) -> Self {
        let first = |tag| dataset.get(tag).and_then(|e| e.to_f64());

        let window = match (first(tags::WINDOW_CENTER), first(tags::WINDOW_WIDTH)) {
            (Some(center), Some(width)) if width > 0.0 => Some((center, width)),
            _ => None,
        };

        DisplayParameters {
            rescale_slope: first(tags::RESCALE_SLOPE).unwrap_or(1.0),
            rescale_intercept: first(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
            window,
            invert: description.photometric_interpretation
                == PhotometricInterpretation::Monochrome1,
            signed: description.is_signed(),
        }
    }

    fn is_identity(&self) -> bool {
        self.rescale_slope == 1.0
            && self.rescale_intercept == 0.0
            && self.window.is_none()
            && !self.signed
    }

    /// Grayscale frames become `Luma8`, color frames `Rgb8`.
    pub fn to_display(&self, image: DynamicImage) -> DynamicImage {
        let gray = match image {
            DynamicImage::ImageLuma8(gray) if self.is_identity() => gray,
            DynamicImage::ImageLuma8(gray) => self.map(&gray, if self.signed { 128.0 } else { 0.0 }),
            DynamicImage::ImageLuma16(gray) => {
                self.map(&gray, if self.signed { 32768.0 } else { 0.0 })
            }
            color => return DynamicImage::ImageRgb8(color.into_rgb8()),
        };

        let gray = if self.invert { invert(gray) } else { gray };
        DynamicImage::ImageLuma8(gray)
    }

    /// Rescales each sample, then windows it, or stretches min to max when
    /// no window is set. A flat frame maps to black.
    fn map<P>(&self, gray: &ImageBuffer<Luma<P>, Vec<P>>, bias: f64) -> GrayImage
    where
        P: Primitive + Into<f64>,
    {
        let value = |pixel: &Luma<P>| {
            (Into::<f64>::into(pixel.0[0]) - bias) * self.rescale_slope + self.rescale_intercept
        };

        let (lower, upper) = match self.window {
            Some((center, width)) => (center - width / 2.0, center + width / 2.0),
            None => gray
                .pixels()
                .map(value)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
                    (min.min(v), max.max(v))
                }),
        };
        let range = upper - lower;

        GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let v = value(gray.get_pixel(x, y));
            Luma([if range <= 0.0 || v <= lower {
                0
            } else if v > upper {
                255
            } else {
                ((v - lower) / range * 255.0).round() as u8
            }])
        })
    }
}

fn invert(mut gray: GrayImage) -> GrayImage {
    for pixel in gray.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    gray
}
