use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::transfer_syntax::TransferSyntax;

/// A (group, element) attribute identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u16, pub u16);

impl Tag {
    pub const fn group(self) -> u16 {
        self.0
    }

    pub const fn element(self) -> u16 {
        self.1
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

/// Value representation of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vr {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FD,
    FL,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

const VR_TABLE: [(Vr, &str, &str); 34] = [
    (Vr::AE, "AE", "Application Entity"),
    (Vr::AS, "AS", "Age String"),
    (Vr::AT, "AT", "Attribute Tag"),
    (Vr::CS, "CS", "Code String"),
    (Vr::DA, "DA", "Date"),
    (Vr::DS, "DS", "Decimal String"),
    (Vr::DT, "DT", "Date Time"),
    (Vr::FD, "FD", "Floating Point Double"),
    (Vr::FL, "FL", "Floating Point Single"),
    (Vr::IS, "IS", "Integer String"),
    (Vr::LO, "LO", "Long String"),
    (Vr::LT, "LT", "Long Text"),
    (Vr::OB, "OB", "Other Byte"),
    (Vr::OD, "OD", "Other Double"),
    (Vr::OF, "OF", "Other Float"),
    (Vr::OL, "OL", "Other Long"),
    (Vr::OV, "OV", "Other 64-bit Very Long"),
    (Vr::OW, "OW", "Other Word"),
    (Vr::PN, "PN", "Person Name"),
    (Vr::SH, "SH", "Short String"),
    (Vr::SL, "SL", "Signed Long"),
    (Vr::SQ, "SQ", "Sequence of Items"),
    (Vr::SS, "SS", "Signed Short"),
    (Vr::ST, "ST", "Short Text"),
    (Vr::SV, "SV", "Signed 64-bit Very Long"),
    (Vr::TM, "TM", "Time"),
    (Vr::UC, "UC", "Unlimited Characters"),
    (Vr::UI, "UI", "Unique Identifier (UID)"),
    (Vr::UL, "UL", "Unsigned Long"),
    (Vr::UN, "UN", "Unknown"),
    (Vr::UR, "UR", "Universal Resource Identifier"),
    (Vr::US, "US", "Unsigned Short"),
    (Vr::UT, "UT", "Unlimited Text"),
    (Vr::UV, "UV", "Unsigned 64-bit Very Long"),
];

impl Vr {
    /// Reads the two character code found in explicit VR encodings.
    pub fn from_bytes(code: &[u8]) -> Option<Vr> {
        VR_TABLE
            .iter()
            .find(|(_, name, _)| name.as_bytes() == code)
            .map(|(vr, _, _)| *vr)
    }

    pub fn as_str(self) -> &'static str {
        VR_TABLE
            .iter()
            .find(|(vr, _, _)| *vr == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("UN")
    }

    pub fn description(self) -> &'static str {
        VR_TABLE
            .iter()
            .find(|(vr, _, _)| *vr == self)
            .map(|(_, _, description)| *description)
            .unwrap_or("Unknown")
    }

    /// Whether the explicit VR header carries 2 reserved bytes and a 32-bit length.
    pub fn has_long_length(self) -> bool {
        matches!(
            self,
            Vr::OB
                | Vr::OD
                | Vr::OF
                | Vr::OL
                | Vr::OV
                | Vr::OW
                | Vr::SQ
                | Vr::SV
                | Vr::UC
                | Vr::UN
                | Vr::UR
                | Vr::UT
                | Vr::UV
        )
    }

    /// Text VRs whose value is a single string where `\` is not a separator.
    pub fn is_single_text(self) -> bool {
        matches!(self, Vr::LT | Vr::ST | Vr::UT | Vr::UR)
    }
}

impl FromStr for Vr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vr::from_bytes(s.trim().as_bytes()).ok_or_else(|| format!("unknown VR {s:?}"))
    }
}

impl fmt::Display for Vr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encapsulated pixel data: the basic offset table and the raw fragments,
/// in the order they appear in the stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PixelFragments {
    pub offset_table: Vec<u32>,
    pub fragments: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DicomValue {
    Strings(Vec<String>),
    Tags(Vec<Tag>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    Bytes(Vec<u8>),
    Sequence(Vec<DataSet>),
    PixelSequence(PixelFragments),
}

impl DicomValue {
    /// Text form used by the header extraction path.
    pub fn to_display_string(&self) -> String {
        fn join<T: ToString>(values: &[T]) -> String {
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\\")
        }

        match self {
            DicomValue::Strings(v) => v.join("\\"),
            DicomValue::Tags(v) => join(v),
            DicomValue::Float(v) => join(v),
            DicomValue::Double(v) => join(v),
            DicomValue::I16(v) => join(v),
            DicomValue::I32(v) => join(v),
            DicomValue::I64(v) => join(v),
            DicomValue::U16(v) => join(v),
            DicomValue::U32(v) => join(v),
            DicomValue::U64(v) => join(v),
            DicomValue::Bytes(v) => format!("<{} bytes>", v.len()),
            DicomValue::Sequence(items) => format!("[{} item(s)]", items.len()),
            DicomValue::PixelSequence(seq) => format!("<{} fragment(s)>", seq.fragments.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    pub tag: Tag,
    pub vr: Vr,
    pub value: DicomValue,
}

impl DataElement {
    pub fn new(tag: Tag, vr: Vr, value: DicomValue) -> Self {
        DataElement { tag, vr, value }
    }

    /// First string value.
    pub fn to_str(&self) -> Option<&str> {
        match &self.value {
            DicomValue::Strings(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// First value as an unsigned 16-bit integer, accepting any integer VR
    /// as long as the value fits.
    pub fn to_u16(&self) -> Option<u16> {
        self.to_i64().and_then(|v| u16::try_from(v).ok())
    }

    pub fn to_i64(&self) -> Option<i64> {
        match &self.value {
            DicomValue::U16(v) => v.first().map(|&x| i64::from(x)),
            DicomValue::I16(v) => v.first().map(|&x| i64::from(x)),
            DicomValue::U32(v) => v.first().map(|&x| i64::from(x)),
            DicomValue::I32(v) => v.first().map(|&x| i64::from(x)),
            DicomValue::I64(v) => v.first().copied(),
            DicomValue::U64(v) => v.first().and_then(|&x| i64::try_from(x).ok()),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match &self.value {
            DicomValue::Double(v) => v.first().copied(),
            DicomValue::Float(v) => v.first().map(|&x| f64::from(x)),
            _ => self.to_i64().map(|v| v as f64),
        }
    }
}

/// Elements of one data set (or sequence item), keyed and ordered by tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    elements: BTreeMap<Tag, DataElement>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element, handing it back if the tag is already present.
    pub fn insert(&mut self, element: DataElement) -> Result<(), DataElement> {
        if self.elements.contains_key(&element.tag) {
            return Err(element);
        }
        self.elements.insert(element.tag, element);
        Ok(())
    }

    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        self.elements.get(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataElement> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// A parsed file: its data set (file meta group included) and the
/// transfer syntax its body was encoded with.
#[derive(Debug, Clone, PartialEq)]
pub struct DicomObject {
    pub transfer_syntax: &'static TransferSyntax,
    pub dataset: DataSet,
}
