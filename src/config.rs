use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::{OutputFormat, RenderOptions};
use crate::resample::ResampleFilter;

/// DICOM upload server: stores files, extracts header attributes and
/// renders frame zero as an image
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct ServerConfig {
    /// Verbose mode
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,
    /// Which port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,
    /// Directory for uploaded files
    #[arg(short = 'o', long = "storage-dir", default_value = "./uploads")]
    pub storage_dir: PathBuf,
    /// Largest accepted upload body, in bytes
    #[arg(long = "max-upload-bytes", default_value_t = 10 << 20)]
    pub max_upload_bytes: usize,
    /// Width of rendered images
    #[arg(long, default_value_t = 512, value_parser(clap::value_parser!(u32).range(1..=16384)))]
    pub width: u32,
    /// Height of rendered images
    #[arg(long, default_value_t = 512, value_parser(clap::value_parser!(u32).range(1..=16384)))]
    pub height: u32,
    /// Default container of rendered images
    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    pub format: OutputFormat,
    /// JPEG quality, 1 to 100
    #[arg(long = "jpeg-quality", default_value_t = 100, value_parser(clap::value_parser!(u8).range(1..=100)))]
    pub jpeg_quality: u8,
    /// Resampling filter
    #[arg(long, value_enum, default_value_t = ResampleFilter::Lanczos3)]
    pub filter: ResampleFilter,
    /// Decode all frames on conversion and fail on any bad one
    #[arg(long = "validate-all-frames")]
    pub validate_all_frames: bool,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            width: self.width,
            height: self.height,
            filter: self.filter,
            format: self.format,
            jpeg_quality: self.jpeg_quality,
            validate_all_frames: self.validate_all_frames,
        }
    }
}
