use thiserror::Error;

use crate::model::Tag;

/// Failure to turn a byte stream into a data set.
///
/// Parsing is all-or-nothing: whenever one of these is returned no data set
/// exists, not even a partial one.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of data at offset {offset} ({needed} more byte(s) needed)")]
    Truncated { offset: usize, needed: usize },

    #[error("missing DICM prefix after the 128 byte preamble")]
    InvalidMagic,

    #[error("file meta information has no transfer syntax uid")]
    MissingTransferSyntax,

    #[error("unsupported transfer syntax {0}")]
    UnsupportedTransferSyntax(String),

    #[error("malformed element {tag} at offset {offset}: {reason}")]
    MalformedElement {
        tag: Tag,
        offset: usize,
        reason: String,
    },

    #[error("element {0} occurs more than once in the same data set")]
    DuplicateTag(Tag),
}

#[derive(Debug, Error)]
pub enum DicomError {
    #[error("failed to parse DICOM data: {0}")]
    Parse(#[from] ParseError),

    #[error("unknown tag name {0:?}")]
    UnknownTagName(String),

    #[error("tag {0} not found")]
    TagNotFound(Tag),

    #[error("unsupported pixel encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("failed to decode frame {frame}: {reason}")]
    FrameDecode { frame: u32, reason: String },

    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DicomError {
    pub(crate) fn frame(frame: u32, reason: impl Into<String>) -> Self {
        DicomError::FrameDecode {
            frame,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        DicomError::UnsupportedEncoding(reason.into())
    }
}
