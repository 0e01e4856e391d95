/// Byte order of multi-byte values in the data set body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// How the pixel data of a transfer syntax is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Native, uncompressed pixel data.
    None,
    JpegBaseline,
    JpegExtended,
    JpegLossless,
    JpegLs,
    Jpeg2000,
    RleLossless,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TransferSyntax {
    pub uid: &'static str,
    pub name: &'static str,
    pub byte_order: ByteOrder,
    pub explicit_vr: bool,
    pub codec: Codec,
}

impl TransferSyntax {
    pub fn is_encapsulated(&self) -> bool {
        self.codec != Codec::None
    }
}

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";

const fn encapsulated(uid: &'static str, name: &'static str, codec: Codec) -> TransferSyntax {
    TransferSyntax {
        uid,
        name,
        byte_order: ByteOrder::Little,
        explicit_vr: true,
        codec,
    }
}

static REGISTRY: [TransferSyntax; 12] = [
    TransferSyntax {
        uid: IMPLICIT_VR_LITTLE_ENDIAN,
        name: "Implicit VR Little Endian",
        byte_order: ByteOrder::Little,
        explicit_vr: false,
        codec: Codec::None,
    },
    TransferSyntax {
        uid: EXPLICIT_VR_LITTLE_ENDIAN,
        name: "Explicit VR Little Endian",
        byte_order: ByteOrder::Little,
        explicit_vr: true,
        codec: Codec::None,
    },
    TransferSyntax {
        uid: EXPLICIT_VR_BIG_ENDIAN,
        name: "Explicit VR Big Endian",
        byte_order: ByteOrder::Big,
        explicit_vr: true,
        codec: Codec::None,
    },
    encapsulated(JPEG_BASELINE, "JPEG Baseline (Process 1)", Codec::JpegBaseline),
    encapsulated(
        "1.2.840.10008.1.2.4.51",
        "JPEG Extended (Process 2 & 4)",
        Codec::JpegExtended,
    ),
    encapsulated(
        "1.2.840.10008.1.2.4.57",
        "JPEG Lossless, Non-Hierarchical (Process 14)",
        Codec::JpegLossless,
    ),
    encapsulated(
        "1.2.840.10008.1.2.4.70",
        "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
        Codec::JpegLossless,
    ),
    encapsulated("1.2.840.10008.1.2.4.80", "JPEG-LS Lossless", Codec::JpegLs),
    encapsulated("1.2.840.10008.1.2.4.81", "JPEG-LS Lossy (Near-Lossless)", Codec::JpegLs),
    encapsulated("1.2.840.10008.1.2.4.90", "JPEG 2000 (Lossless Only)", Codec::Jpeg2000),
    encapsulated("1.2.840.10008.1.2.4.91", "JPEG 2000", Codec::Jpeg2000),
    encapsulated(RLE_LOSSLESS, "RLE Lossless", Codec::RleLossless),
];

/// Finds a supported transfer syntax by UID, ignoring trailing padding.
pub fn lookup(uid: &str) -> Option<&'static TransferSyntax> {
    let uid = uid.trim_end_matches(&['\0', ' '][..]);
    REGISTRY.iter().find(|ts| ts.uid == uid)
}
