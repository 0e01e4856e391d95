use std::fmt;

use clap::ValueEnum;
use image::imageops::FilterType;
use image::DynamicImage;

/// Interpolation used when scaling a frame to the output size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ResampleFilter {
    /// Nearest neighbour, blocky but exact sample values.
    Nearest,

    /// Linear interpolation.
    Triangle,

    /// Cubic interpolation.
    CatmullRom,

    /// Soft blur that reduces aliasing.
    Gaussian,

    /// Windowed sinc, sharpest of the set.
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    pub fn filter_type(&self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Triangle => write!(f, "triangle"),
            Self::CatmullRom => write!(f, "catmull-rom"),
            Self::Gaussian => write!(f, "gaussian"),
            Self::Lanczos3 => write!(f, "lanczos3"),
        }
    }
}

/// Scales to exactly `width` x `height`, ignoring the source aspect ratio.
pub fn resize(image: &DynamicImage, width: u32, height: u32, filter: ResampleFilter) -> DynamicImage {
    image.resize_exact(width, height, filter.filter_type())
}
