//! In-memory DICOM files for the unit tests.

use crate::transfer_syntax::{
    EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN,
};

const UNDEFINED: u32 = 0xFFFF_FFFF;
const LONG_VRS: [&str; 13] = [
    "OB", "OD", "OF", "OL", "OV", "OW", "SQ", "SV", "UC", "UN", "UR", "UT", "UV",
];

pub struct DicomBuilder {
    transfer_syntax: String,
    explicit_vr: bool,
    big_endian: bool,
    group_length: bool,
    body: Vec<u8>,
}

impl DicomBuilder {
    fn with_syntax(uid: &str, explicit_vr: bool, big_endian: bool) -> Self {
        DicomBuilder {
            transfer_syntax: uid.to_string(),
            explicit_vr,
            big_endian,
            group_length: true,
            body: Vec::new(),
        }
    }

    pub fn explicit_le() -> Self {
        Self::with_syntax(EXPLICIT_VR_LITTLE_ENDIAN, true, false)
    }

    pub fn implicit_le() -> Self {
        Self::with_syntax(IMPLICIT_VR_LITTLE_ENDIAN, false, false)
    }

    pub fn explicit_be() -> Self {
        Self::with_syntax(EXPLICIT_VR_BIG_ENDIAN, true, true)
    }

    /// Explicit VR little endian body announced under another transfer
    /// syntax UID (encapsulated syntaxes, or unsupported ones).
    pub fn declared_as(uid: &str) -> Self {
        Self::with_syntax(uid, true, false)
    }

    pub fn without_group_length(mut self) -> Self {
        self.group_length = false;
        self
    }

    pub fn u16_bytes(&self, value: u16) -> [u8; 2] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn u32_bytes(&self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn header(&mut self, tag: (u16, u16), vr: &str, length: u32) {
        let group = self.u16_bytes(tag.0);
        let element = self.u16_bytes(tag.1);
        self.body.extend_from_slice(&group);
        self.body.extend_from_slice(&element);
        if self.explicit_vr {
            self.body.extend_from_slice(vr.as_bytes());
            if LONG_VRS.contains(&vr) {
                self.body.extend_from_slice(&[0, 0]);
                let length = self.u32_bytes(length);
                self.body.extend_from_slice(&length);
            } else {
                let length = self.u16_bytes(length as u16);
                self.body.extend_from_slice(&length);
            }
        } else {
            let length = self.u32_bytes(length);
            self.body.extend_from_slice(&length);
        }
    }

    fn delimiter(&mut self, tag: (u16, u16), length: u32) {
        let group = self.u16_bytes(tag.0);
        let element = self.u16_bytes(tag.1);
        let length = self.u32_bytes(length);
        self.body.extend_from_slice(&group);
        self.body.extend_from_slice(&element);
        self.body.extend_from_slice(&length);
    }

    pub fn element(mut self, tag: (u16, u16), vr: &str, value: &[u8]) -> Self {
        let mut value = value.to_vec();
        if value.len() % 2 == 1 {
            value.push(if matches!(vr, "UI" | "OB" | "UN") { 0 } else { b' ' });
        }
        self.header(tag, vr, value.len() as u32);
        self.body.extend_from_slice(&value);
        self
    }

    pub fn text(self, tag: (u16, u16), vr: &str, text: &str) -> Self {
        self.element(tag, vr, text.as_bytes())
    }

    pub fn us(self, tag: (u16, u16), value: u16) -> Self {
        let bytes = self.u16_bytes(value);
        self.element(tag, "US", &bytes)
    }

    /// Sequence of undefined length whose items (also of undefined length)
    /// hold the given encoded element bytes.
    pub fn undefined_sequence(mut self, tag: (u16, u16), items: &[Vec<u8>]) -> Self {
        self.header(tag, "SQ", UNDEFINED);
        for item in items {
            self.delimiter((0xFFFE, 0xE000), UNDEFINED);
            self.body.extend_from_slice(item);
            self.delimiter((0xFFFE, 0xE00D), 0);
        }
        self.delimiter((0xFFFE, 0xE0DD), 0);
        self
    }

    /// Sequence and items with explicit lengths.
    pub fn defined_sequence(mut self, tag: (u16, u16), items: &[Vec<u8>]) -> Self {
        let length = items.iter().map(|item| 8 + item.len()).sum::<usize>();
        self.header(tag, "SQ", length as u32);
        for item in items {
            self.delimiter((0xFFFE, 0xE000), item.len() as u32);
            self.body.extend_from_slice(item);
        }
        self
    }

    pub fn encapsulated_pixel_data(mut self, offset_table: &[u32], fragments: &[Vec<u8>]) -> Self {
        self.header((0x7FE0, 0x0010), "OB", UNDEFINED);
        self.delimiter((0xFFFE, 0xE000), (offset_table.len() * 4) as u32);
        for offset in offset_table {
            let bytes = self.u32_bytes(*offset);
            self.body.extend_from_slice(&bytes);
        }
        for fragment in fragments {
            let mut fragment = fragment.clone();
            if fragment.len() % 2 == 1 {
                fragment.push(0);
            }
            self.delimiter((0xFFFE, 0xE000), fragment.len() as u32);
            self.body.extend_from_slice(&fragment);
        }
        self.delimiter((0xFFFE, 0xE0DD), 0);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    /// Encoded elements only, for nesting inside sequence items.
    pub fn body(self) -> Vec<u8> {
        self.body
    }

    pub fn build(self) -> Vec<u8> {
        let mut meta = Vec::new();
        meta.extend(meta_element((0x0002, 0x0001), "OB", &[0, 1]));
        meta.extend(meta_element((0x0002, 0x0002), "UI", b"1.2.840.10008.5.1.4.1.1.7"));
        meta.extend(meta_element((0x0002, 0x0003), "UI", b"1.2.826.0.1.3680043.2.1"));
        meta.extend(meta_element((0x0002, 0x0010), "UI", self.transfer_syntax.as_bytes()));

        let mut out = vec![0u8; 128];
        out.extend_from_slice(b"DICM");
        if self.group_length {
            out.extend(meta_element(
                (0x0002, 0x0000),
                "UL",
                &(meta.len() as u32).to_le_bytes(),
            ));
        }
        out.extend(meta);
        out.extend(self.body);
        out
    }
}

/// An explicit VR little endian element, as used by the file meta group.
pub fn meta_element(tag: (u16, u16), vr: &str, value: &[u8]) -> Vec<u8> {
    let mut builder = DicomBuilder::explicit_le();
    builder = builder.element(tag, vr, value);
    builder.body()
}

/// Ramp of `len` bytes.
pub fn gradient(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Common image attributes of a monochrome file, up to (not including)
/// the pixel data.
pub fn monochrome(builder: DicomBuilder, rows: u16, columns: u16, bits: u16) -> DicomBuilder {
    builder
        .text((0x0008, 0x0060), "CS", "OT")
        .text((0x0010, 0x0020), "LO", "PID-0001")
        .us((0x0028, 0x0002), 1)
        .text((0x0028, 0x0004), "CS", "MONOCHROME2")
        .us((0x0028, 0x0010), rows)
        .us((0x0028, 0x0011), columns)
        .us((0x0028, 0x0100), bits)
        .us((0x0028, 0x0101), bits)
        .us((0x0028, 0x0102), bits - 1)
        .us((0x0028, 0x0103), 0)
}

/// Complete single-frame, 8-bit grayscale, explicit VR little endian file.
pub fn monochrome_8bit(rows: u16, columns: u16) -> Vec<u8> {
    let pixels = gradient(rows as usize * columns as usize);
    monochrome(DicomBuilder::explicit_le(), rows, columns, 8)
        .element((0x7FE0, 0x0010), "OB", &pixels)
        .build()
}
