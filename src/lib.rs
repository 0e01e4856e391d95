//! Stores DICOM files and reads them back: a single attribute as text, or
//! the first frame of the pixel data as a browser-displayable image.
//!
//! The conversion path is parse → locate pixel data → decode frame zero →
//! display windowing → resize → encode, see [`pipeline`].

use lazy_static::lazy_static;

pub mod config;
pub mod dictionary;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod pixel;
pub mod resample;
pub mod resolver;
pub mod server;
pub mod storage;
pub mod transfer_syntax;
pub mod util;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DicomError, ParseError};
pub use model::{DataElement, DataSet, DicomObject, DicomValue, Tag, Vr};

pub type CommonResult<T> = std::result::Result<T, DicomError>;

lazy_static! {
    /// Process-wide attribute dictionary, built on first use and never mutated.
    pub static ref DICTIONARY: dictionary::TagDictionary =
        dictionary::TagDictionary::load(include_str!("../tag_mapping.txt"));
}
