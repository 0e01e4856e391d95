//! Binary DICOM parsing: preamble, file meta group, then the data set in the
//! transfer syntax the meta group announces.

use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::dictionary::tags;
use crate::error::ParseError;
use crate::model::{DataElement, DataSet, DicomObject, DicomValue, PixelFragments, Tag, Vr};
use crate::resolver::implicit_vr;
use crate::transfer_syntax::{self, ByteOrder};
use crate::util::{decode_numbers, hex_preview, ByteReader};
use crate::CommonResult;

const PREAMBLE_LENGTH: usize = 128;
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Encoding state that nested items inherit from their parent data set.
#[derive(Debug, Clone, Copy)]
struct Context {
    explicit_vr: bool,
    charset: &'static Encoding,
    /// Number of enclosing sequences.
    depth: usize,
}

const MAX_SEQUENCE_DEPTH: usize = 64;

/// Reads a whole file and parses it. The file handle is closed before
/// parsing starts.
pub fn parse_file(path: impl AsRef<Path>) -> CommonResult<DicomObject> {
    let path = path.as_ref();
    let content = std::fs::read(path)?;
    let object = parse_bytes(&content)?;

    debug!(
        path = %path.display(),
        elements = object.dataset.len(),
        transfer_syntax = object.transfer_syntax.name,
        "parsed DICOM file"
    );

    Ok(object)
}

pub fn parse_bytes(buffer: &[u8]) -> Result<DicomObject, ParseError> {
    let mut reader = ByteReader::new(buffer, ByteOrder::Little);

    get_preamble(&mut reader)?;
    get_prefix(&mut reader)?;

    let mut dataset = DataSet::new();
    let meta_context = Context {
        explicit_vr: true,
        charset: encoding_rs::WINDOWS_1252,
        depth: 0,
    };
    get_meta_group(&mut reader, meta_context, &mut dataset)?;

    let uid = dataset
        .get(tags::TRANSFER_SYNTAX_UID)
        .and_then(DataElement::to_str)
        .ok_or(ParseError::MissingTransferSyntax)?;
    let transfer_syntax = transfer_syntax::lookup(uid)
        .ok_or_else(|| ParseError::UnsupportedTransferSyntax(uid.to_string()))?;

    reader.set_order(transfer_syntax.byte_order);
    let context = Context {
        explicit_vr: transfer_syntax.explicit_vr,
        ..meta_context
    };
    get_data_elements(&mut reader, context, &mut dataset)?;

    Ok(DicomObject {
        transfer_syntax,
        dataset,
    })
}

fn get_preamble(reader: &mut ByteReader) -> Result<(), ParseError> {
    reader.take(PREAMBLE_LENGTH)?;
    Ok(())
}

fn get_prefix(reader: &mut ByteReader) -> Result<(), ParseError> {
    if reader.take(4)? != b"DICM" {
        return Err(ParseError::InvalidMagic);
    }
    Ok(())
}

/// File meta information, always explicit VR little endian. When the group
/// length element is present it bounds the group exactly.
fn get_meta_group(
    reader: &mut ByteReader,
    context: Context,
    dataset: &mut DataSet,
) -> Result<(), ParseError> {
    if reader.peek_tag()? == tags::FILE_META_INFORMATION_GROUP_LENGTH {
        let offset = reader.position();
        let element = get_data_element(reader, context)?;
        let length = match &element.value {
            DicomValue::U32(v) => v.first().copied(),
            _ => None,
        }
        .ok_or_else(|| malformed(element.tag, offset, "group length must be a single UL"))?;
        insert(dataset, element)?;

        let mut meta = reader.sub_reader(length as usize)?;
        return get_data_elements(&mut meta, context, dataset);
    }

    while !reader.is_empty() && reader.peek_tag()?.group() == 0x0002 {
        let element = get_data_element(reader, context)?;
        insert(dataset, element)?;
    }
    Ok(())
}

fn get_data_elements(
    reader: &mut ByteReader,
    mut context: Context,
    dataset: &mut DataSet,
) -> Result<(), ParseError> {
    while !reader.is_empty() {
        let element = get_data_element(reader, context)?;
        push_element(dataset, element, &mut context)?;
    }
    Ok(())
}

fn push_element(
    dataset: &mut DataSet,
    element: DataElement,
    context: &mut Context,
) -> Result<(), ParseError> {
    if element.tag == tags::SPECIFIC_CHARACTER_SET {
        context.charset = charset_for(&element);
    }
    insert(dataset, element)
}

fn insert(dataset: &mut DataSet, element: DataElement) -> Result<(), ParseError> {
    dataset
        .insert(element)
        .map_err(|duplicate| ParseError::DuplicateTag(duplicate.tag))
}

fn get_data_element(reader: &mut ByteReader, context: Context) -> Result<DataElement, ParseError> {
    let offset = reader.position();
    let tag = reader.read_tag()?;

    if tag.group() == 0xFFFE {
        return Err(malformed(tag, offset, "item or delimiter outside of a sequence"));
    }

    let (vr, length) = if context.explicit_vr {
        let code = reader.take(2)?;
        let vr = Vr::from_bytes(code).ok_or_else(|| {
            malformed(tag, offset, format!("unknown VR code {}", hex_preview(code, 2)))
        })?;
        let length = if vr.has_long_length() {
            // reserved
            reader.take(2)?;
            reader.read_u32()?
        } else {
            u32::from(reader.read_u16()?)
        };
        (vr, length)
    } else {
        let length = reader.read_u32()?;
        (implicit_vr(tag), length)
    };

    let value = if tag == tags::PIXEL_DATA && length == UNDEFINED_LENGTH {
        parse_pixel_sequence(reader)?
    } else if vr == Vr::SQ {
        parse_sq_data(reader, nested(context, tag, offset)?, length)?
    } else if vr == Vr::UN && length == UNDEFINED_LENGTH {
        // an undefined length UN is a sequence encoded in implicit VR little endian
        let order = reader.order();
        reader.set_order(ByteOrder::Little);
        let inner = Context {
            explicit_vr: false,
            ..nested(context, tag, offset)?
        };
        let value = parse_sq_data(reader, inner, length);
        reader.set_order(order);
        value?
    } else if length == UNDEFINED_LENGTH {
        return Err(malformed(
            tag,
            offset,
            format!("undefined length is not allowed for VR {vr}"),
        ));
    } else {
        let bytes = reader.take(length as usize)?;
        parse_data(bytes, vr, reader.order(), context.charset)
            .map_err(|reason| malformed(tag, offset, reason))?
    };

    Ok(DataElement::new(tag, vr, value))
}

fn nested(context: Context, tag: Tag, offset: usize) -> Result<Context, ParseError> {
    if context.depth >= MAX_SEQUENCE_DEPTH {
        return Err(malformed(tag, offset, "sequence nesting too deep"));
    }
    Ok(Context {
        depth: context.depth + 1,
        ..context
    })
}

fn parse_data(
    bytes: &[u8],
    vr: Vr,
    order: ByteOrder,
    charset: &'static Encoding,
) -> Result<DicomValue, String> {
    let value = match vr {
        Vr::US => DicomValue::U16(numbers(bytes, order, u16::from_le_bytes, u16::from_be_bytes)?),
        Vr::SS => DicomValue::I16(numbers(bytes, order, i16::from_le_bytes, i16::from_be_bytes)?),
        Vr::UL => DicomValue::U32(numbers(bytes, order, u32::from_le_bytes, u32::from_be_bytes)?),
        Vr::SL => DicomValue::I32(numbers(bytes, order, i32::from_le_bytes, i32::from_be_bytes)?),
        Vr::UV => DicomValue::U64(numbers(bytes, order, u64::from_le_bytes, u64::from_be_bytes)?),
        Vr::SV => DicomValue::I64(numbers(bytes, order, i64::from_le_bytes, i64::from_be_bytes)?),
        Vr::FL => DicomValue::Float(numbers(bytes, order, f32::from_le_bytes, f32::from_be_bytes)?),
        Vr::FD => {
            DicomValue::Double(numbers(bytes, order, f64::from_le_bytes, f64::from_be_bytes)?)
        }
        Vr::AT => {
            let raw = numbers(bytes, order, u16::from_le_bytes, u16::from_be_bytes)?;
            if raw.len() % 2 != 0 {
                return Err(format!("AT value of {} bytes", bytes.len()));
            }
            DicomValue::Tags(raw.chunks_exact(2).map(|p| Tag(p[0], p[1])).collect())
        }
        Vr::DS => DicomValue::Double(
            text_values(bytes, vr, charset)
                .iter()
                .map(|v| v.parse::<f64>().map_err(|_| format!("bad decimal string {v:?}")))
                .collect::<Result<_, _>>()?,
        ),
        Vr::IS => DicomValue::I64(
            text_values(bytes, vr, charset)
                .iter()
                .map(|v| v.parse::<i64>().map_err(|_| format!("bad integer string {v:?}")))
                .collect::<Result<_, _>>()?,
        ),
        Vr::OB | Vr::OD | Vr::OF | Vr::OL | Vr::OV | Vr::OW | Vr::UN => {
            DicomValue::Bytes(bytes.to_vec())
        }
        Vr::SQ => return Err("sequence value outside of sequence parsing".to_string()),
        _ => DicomValue::Strings(text_values(bytes, vr, charset)),
    };

    Ok(value)
}

fn numbers<const N: usize, T>(
    bytes: &[u8],
    order: ByteOrder,
    from_le: fn([u8; N]) -> T,
    from_be: fn([u8; N]) -> T,
) -> Result<Vec<T>, String> {
    if bytes.len() % N != 0 {
        return Err(format!("length {} is not a multiple of {}", bytes.len(), N));
    }
    Ok(decode_numbers(bytes, order, from_le, from_be))
}

/// Decodes text with the active character set, then splits multi-valued
/// VRs on `\` and strips space/NUL padding.
fn text_values(bytes: &[u8], vr: Vr, charset: &'static Encoding) -> Vec<String> {
    let (text, _) = charset.decode_without_bom_handling(bytes);
    let text = text.trim_end_matches(&[' ', '\0'][..]);

    if text.is_empty() {
        return Vec::new();
    }
    if vr.is_single_text() {
        return vec![text.to_string()];
    }

    text.split('\\')
        .map(|v| v.trim_matches(&[' ', '\0'][..]).to_string())
        .collect()
}

fn charset_for(element: &DataElement) -> &'static Encoding {
    let term = match &element.value {
        DicomValue::Strings(v) => v.iter().find(|t| !t.is_empty()).map(String::as_str),
        _ => None,
    }
    .unwrap_or("");

    match term {
        "" | "ISO_IR 6" | "ISO_IR 100" | "ISO 2022 IR 6" | "ISO 2022 IR 100" => {
            encoding_rs::WINDOWS_1252
        }
        "ISO_IR 192" => encoding_rs::UTF_8,
        "GB18030" => encoding_rs::GB18030,
        "GBK" => encoding_rs::GBK,
        "ISO_IR 101" | "ISO 2022 IR 101" => encoding_rs::ISO_8859_2,
        "ISO_IR 144" | "ISO 2022 IR 144" => encoding_rs::ISO_8859_5,
        "ISO_IR 127" | "ISO 2022 IR 127" => encoding_rs::ISO_8859_6,
        "ISO_IR 126" | "ISO 2022 IR 126" => encoding_rs::ISO_8859_7,
        "ISO_IR 138" | "ISO 2022 IR 138" => encoding_rs::ISO_8859_8,
        "ISO_IR 148" | "ISO 2022 IR 148" => encoding_rs::WINDOWS_1254,
        "ISO_IR 13" | "ISO 2022 IR 13" => encoding_rs::SHIFT_JIS,
        "ISO_IR 166" | "ISO 2022 IR 166" => encoding_rs::WINDOWS_874,
        "ISO 2022 IR 87" | "ISO 2022 IR 159" => encoding_rs::ISO_2022_JP,
        "ISO 2022 IR 149" => encoding_rs::EUC_KR,
        other => {
            warn!("unsupported specific character set {other:?}, using windows-1252");
            encoding_rs::WINDOWS_1252
        }
    }
}

fn parse_sq_data(
    reader: &mut ByteReader,
    context: Context,
    length: u32,
) -> Result<DicomValue, ParseError> {
    let items = if length == UNDEFINED_LENGTH {
        parse_sq_items(reader, context, true)?
    } else {
        let mut content = reader.sub_reader(length as usize)?;
        parse_sq_items(&mut content, context, false)?
    };
    Ok(DicomValue::Sequence(items))
}

/// Items up to the sequence delimiter (`delimited`) or to the end of the reader.
fn parse_sq_items(
    reader: &mut ByteReader,
    context: Context,
    delimited: bool,
) -> Result<Vec<DataSet>, ParseError> {
    let mut items = Vec::new();

    loop {
        if !delimited && reader.is_empty() {
            break;
        }

        let offset = reader.position();
        let tag = reader.read_tag()?;
        let length = reader.read_u32()?;

        match tag {
            tags::SEQUENCE_DELIMITATION_ITEM if delimited => break,
            tags::ITEM => items.push(parse_sq_item(reader, context, length)?),
            other => return Err(malformed(other, offset, "expected an item inside the sequence")),
        }
    }

    Ok(items)
}

fn parse_sq_item(
    reader: &mut ByteReader,
    mut context: Context,
    length: u32,
) -> Result<DataSet, ParseError> {
    let mut item = DataSet::new();

    if length != UNDEFINED_LENGTH {
        let mut content = reader.sub_reader(length as usize)?;
        get_data_elements(&mut content, context, &mut item)?;
        return Ok(item);
    }

    loop {
        if reader.peek_tag()? == tags::ITEM_DELIMITATION_ITEM {
            reader.read_tag()?;
            reader.read_u32()?;
            break;
        }
        let element = get_data_element(reader, context)?;
        push_element(&mut item, element, &mut context)?;
    }

    Ok(item)
}

/// Encapsulated pixel data: a basic offset table item followed by fragment
/// items, closed by a sequence delimiter.
fn parse_pixel_sequence(reader: &mut ByteReader) -> Result<DicomValue, ParseError> {
    let mut offset_table = None;
    let mut fragments = Vec::new();

    loop {
        let offset = reader.position();
        let tag = reader.read_tag()?;
        let length = reader.read_u32()?;

        match tag {
            tags::SEQUENCE_DELIMITATION_ITEM => break,
            tags::ITEM if length != UNDEFINED_LENGTH => {
                let bytes = reader.take(length as usize)?;
                if offset_table.is_some() {
                    fragments.push(bytes.to_vec());
                } else {
                    let table = numbers(bytes, ByteOrder::Little, u32::from_le_bytes, u32::from_be_bytes)
                        .map_err(|reason| malformed(tags::PIXEL_DATA, offset, reason))?;
                    offset_table = Some(table);
                }
            }
            other => {
                return Err(malformed(
                    other,
                    offset,
                    "expected a fragment item in encapsulated pixel data",
                ))
            }
        }
    }

    let offset_table = offset_table.ok_or_else(|| {
        malformed(tags::PIXEL_DATA, reader.position(), "missing basic offset table item")
    })?;

    Ok(DicomValue::PixelSequence(PixelFragments {
        offset_table,
        fragments,
    }))
}

fn malformed(tag: Tag, offset: usize, reason: impl Into<String>) -> ParseError {
    ParseError::MalformedElement {
        tag,
        offset,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::testing::{meta_element, monochrome, monochrome_8bit, DicomBuilder};
    use crate::transfer_syntax::{EXPLICIT_VR_BIG_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN, JPEG_BASELINE};
    use crate::DicomError;

    #[test]
    fn parses_explicit_little_endian_file() {
        let bytes = DicomBuilder::explicit_le()
            .text((0x0008, 0x0008), "CS", "ORIGINAL\\PRIMARY")
            .text((0x0010, 0x0010), "PN", "Doe^John")
            .us((0x0028, 0x0010), 256)
            .text((0x0028, 0x1050), "DS", "40.5\\80")
            .text((0x0028, 0x0008), "IS", "3 ")
            .element((0x7FE0, 0x0010), "OB", &[1, 2, 3, 4])
            .build();

        let object = parse_bytes(&bytes).unwrap();
        let dataset = &object.dataset;

        assert_eq!(object.transfer_syntax.name, "Explicit VR Little Endian");
        assert_eq!(dataset.get(tags::PATIENT_NAME).unwrap().to_str(), Some("Doe^John"));
        assert_eq!(
            dataset.get(Tag(0x0008, 0x0008)).unwrap().value,
            DicomValue::Strings(vec!["ORIGINAL".into(), "PRIMARY".into()])
        );
        assert_eq!(dataset.get(tags::ROWS).unwrap().to_u16(), Some(256));
        assert_eq!(
            dataset.get(tags::WINDOW_CENTER).unwrap().value,
            DicomValue::Double(vec![40.5, 80.0])
        );
        assert_eq!(dataset.get(tags::NUMBER_OF_FRAMES).unwrap().to_i64(), Some(3));
        assert_eq!(
            dataset.get(tags::PIXEL_DATA).unwrap().value,
            DicomValue::Bytes(vec![1, 2, 3, 4])
        );
        // file meta group is part of the data set
        assert!(dataset.get(tags::TRANSFER_SYNTAX_UID).is_some());
    }

    #[test]
    fn implicit_vr_takes_vr_from_dictionary() {
        let bytes = DicomBuilder::implicit_le()
            .text((0x0010, 0x0010), "PN", "Doe^Jane")
            .us((0x0028, 0x0010), 64)
            .element((0x0029, 0x1010), "UN", &[9, 9])
            .build();

        let object = parse_bytes(&bytes).unwrap();
        assert_eq!(object.transfer_syntax.uid, IMPLICIT_VR_LITTLE_ENDIAN);

        let rows = object.dataset.get(tags::ROWS).unwrap();
        assert_eq!(rows.vr, Vr::US);
        assert_eq!(rows.to_u16(), Some(64));

        let private = object.dataset.get(Tag(0x0029, 0x1010)).unwrap();
        assert_eq!(private.vr, Vr::UN);
        assert_eq!(private.value, DicomValue::Bytes(vec![9, 9]));
    }

    #[test]
    fn explicit_big_endian_numbers() {
        let bytes = DicomBuilder::explicit_be()
            .us((0x0028, 0x0010), 0x0102)
            .us((0x0028, 0x0011), 0x0304)
            .build();

        let object = parse_bytes(&bytes).unwrap();
        assert_eq!(object.transfer_syntax.uid, EXPLICIT_VR_BIG_ENDIAN);
        assert_eq!(object.dataset.get(tags::ROWS).unwrap().to_u16(), Some(0x0102));
        assert_eq!(object.dataset.get(tags::COLUMNS).unwrap().to_u16(), Some(0x0304));
    }

    #[test]
    fn meta_group_without_group_length() {
        let bytes = DicomBuilder::explicit_le()
            .without_group_length()
            .us((0x0028, 0x0010), 2)
            .build();

        let object = parse_bytes(&bytes).unwrap();
        assert!(object.dataset.get(tags::FILE_META_INFORMATION_GROUP_LENGTH).is_none());
        assert_eq!(object.dataset.get(tags::ROWS).unwrap().to_u16(), Some(2));
    }

    #[test]
    fn rejects_missing_magic() {
        let mut bytes = monochrome_8bit(2, 2);
        bytes[128..132].copy_from_slice(b"DICN");
        assert!(matches!(parse_bytes(&bytes), Err(ParseError::InvalidMagic)));
    }

    #[rstest]
    #[case::empty(0)]
    #[case::inside_preamble(64)]
    #[case::inside_magic(130)]
    #[case::inside_meta_group(150)]
    fn rejects_truncated_header(#[case] keep: usize) {
        let bytes = monochrome_8bit(4, 4);
        assert!(parse_bytes(&bytes[..keep]).is_err());
    }

    #[rstest]
    #[case(1)]
    #[case(8)]
    #[case(15)]
    fn rejects_truncated_pixel_data(#[case] cut: usize) {
        let bytes = monochrome_8bit(4, 4);
        let result = parse_bytes(&bytes[..bytes.len() - cut]);
        assert!(matches!(result, Err(ParseError::Truncated { .. })), "{result:?}");
    }

    #[test]
    fn unsupported_transfer_syntax() {
        let bytes = DicomBuilder::declared_as("1.2.840.10008.1.2.1.99").build();
        match parse_bytes(&bytes) {
            Err(ParseError::UnsupportedTransferSyntax(uid)) => {
                assert_eq!(uid, "1.2.840.10008.1.2.1.99")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_transfer_syntax() {
        let mut bytes = vec![0u8; 128];
        bytes.extend_from_slice(b"DICM");
        bytes.extend(meta_element((0x0002, 0x0001), "OB", &[0, 1]));
        assert!(matches!(
            parse_bytes(&bytes),
            Err(ParseError::MissingTransferSyntax)
        ));
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let bytes = DicomBuilder::explicit_le()
            .us((0x0028, 0x0010), 2)
            .us((0x0028, 0x0010), 3)
            .build();
        assert!(matches!(
            parse_bytes(&bytes),
            Err(ParseError::DuplicateTag(tags::ROWS))
        ));
    }

    #[test]
    fn unknown_vr_code_is_malformed() {
        let bytes = DicomBuilder::explicit_le()
            .raw(&[0x28, 0x00, 0x10, 0x00, b'Z', b'Z', 2, 0, 1, 0])
            .build();
        match parse_bytes(&bytes) {
            Err(ParseError::MalformedElement { tag, reason, .. }) => {
                assert_eq!(tag, tags::ROWS);
                assert!(reason.contains("5A 5A"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn odd_numeric_length_is_malformed() {
        let bytes = DicomBuilder::explicit_le()
            .raw(&[0x28, 0x00, 0x10, 0x00, b'U', b'S', 3, 0, 1, 0, 0])
            .build();
        assert!(matches!(
            parse_bytes(&bytes),
            Err(ParseError::MalformedElement { .. })
        ));
    }

    #[test]
    fn bad_decimal_string_is_malformed() {
        let bytes = DicomBuilder::explicit_le()
            .text((0x0028, 0x1050), "DS", "wide")
            .build();
        assert!(matches!(
            parse_bytes(&bytes),
            Err(ParseError::MalformedElement { .. })
        ));
    }

    #[test]
    fn nested_sequences_of_both_length_kinds() {
        let item = DicomBuilder::explicit_le()
            .text((0x0008, 0x1150), "UI", "1.2.3")
            .text((0x0008, 0x1155), "UI", "1.2.3.4")
            .body();
        let bytes = DicomBuilder::explicit_le()
            .defined_sequence((0x0008, 0x1032), &[item.clone()])
            .undefined_sequence((0x0008, 0x1140), &[item.clone(), item])
            .text((0x0010, 0x0010), "PN", "After^Sequence")
            .build();

        let object = parse_bytes(&bytes).unwrap();

        match &object.dataset.get(Tag(0x0008, 0x1140)).unwrap().value {
            DicomValue::Sequence(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(
                    items[1].get(Tag(0x0008, 0x1155)).unwrap().to_str(),
                    Some("1.2.3.4")
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        match &object.dataset.get(Tag(0x0008, 0x1032)).unwrap().value {
            DicomValue::Sequence(items) => assert_eq!(items.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            object.dataset.get(tags::PATIENT_NAME).unwrap().to_str(),
            Some("After^Sequence")
        );
    }

    /// Sequences nested `depth` deep, each holding one undefined length item.
    fn nested_sequences(depth: usize, closed: bool) -> Vec<u8> {
        let mut open = Vec::new();
        for _ in 0..depth {
            open.extend_from_slice(&[0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0, 0]);
            open.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
            open.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
            open.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
        }
        if closed {
            for _ in 0..depth {
                open.extend_from_slice(&[0xFE, 0xFF, 0x0D, 0xE0, 0, 0, 0, 0]);
                open.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0, 0, 0, 0]);
            }
        }
        DicomBuilder::explicit_le().raw(&open).build()
    }

    #[rstest]
    #[case(1)]
    #[case(16)]
    #[case(MAX_SEQUENCE_DEPTH)]
    fn nesting_within_the_limit_parses(#[case] depth: usize) {
        let object = parse_bytes(&nested_sequences(depth, true)).unwrap();
        assert!(object.dataset.get(Tag(0x0008, 0x1140)).is_some());
    }

    #[rstest]
    #[case(MAX_SEQUENCE_DEPTH + 1)]
    #[case(200_000)]
    fn deep_nesting_is_malformed(#[case] depth: usize) {
        match parse_bytes(&nested_sequences(depth, false)) {
            Err(ParseError::MalformedElement { tag, reason, .. }) => {
                assert_eq!(tag, Tag(0x0008, 0x1140));
                assert_eq!(reason, "sequence nesting too deep");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn implicit_undefined_length_sequence() {
        let item = DicomBuilder::implicit_le()
            .text((0x0008, 0x1150), "UI", "1.2.3")
            .body();
        let bytes = DicomBuilder::implicit_le()
            .undefined_sequence((0x0008, 0x1140), &[item])
            .build();

        let object = parse_bytes(&bytes).unwrap();
        let sequence = object.dataset.get(Tag(0x0008, 0x1140)).unwrap();
        assert_eq!(sequence.vr, Vr::SQ);
        assert_eq!(sequence.value.to_display_string(), "[1 item(s)]");
    }

    #[test]
    fn encapsulated_pixel_data_keeps_fragments() {
        let bytes = monochrome(DicomBuilder::declared_as(JPEG_BASELINE), 2, 2, 8)
            .encapsulated_pixel_data(&[0], &[vec![0xFF, 0xD8, 0xFF, 0xD9], vec![1, 2, 3]])
            .build();

        let object = parse_bytes(&bytes).unwrap();
        assert!(object.transfer_syntax.is_encapsulated());
        match &object.dataset.get(tags::PIXEL_DATA).unwrap().value {
            DicomValue::PixelSequence(seq) => {
                assert_eq!(seq.offset_table, vec![0]);
                assert_eq!(seq.fragments.len(), 2);
                // odd fragments are padded to even length
                assert_eq!(seq.fragments[1], vec![1, 2, 3, 0]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn default_and_declared_character_sets() {
        let latin1 = DicomBuilder::explicit_le()
            .element((0x0010, 0x0010), "PN", b"M\xFCller^Hans")
            .build();
        let object = parse_bytes(&latin1).unwrap();
        assert_eq!(object.dataset.get(tags::PATIENT_NAME).unwrap().to_str(), Some("Müller^Hans"));

        let utf8 = DicomBuilder::explicit_le()
            .text((0x0008, 0x0005), "CS", "ISO_IR 192")
            .text((0x0010, 0x0010), "PN", "Müller^Hans")
            .build();
        let object = parse_bytes(&utf8).unwrap();
        assert_eq!(object.dataset.get(tags::PATIENT_NAME).unwrap().to_str(), Some("Müller^Hans"));
    }

    #[test]
    fn parsing_is_repeatable() {
        let bytes = monochrome_8bit(16, 8);
        assert_eq!(parse_bytes(&bytes).unwrap(), parse_bytes(&bytes).unwrap());
    }

    #[test]
    fn parse_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.dcm");
        std::fs::write(&path, monochrome_8bit(4, 4)).unwrap();

        let object = parse_file(&path).unwrap();
        assert_eq!(object.dataset.get(tags::ROWS).unwrap().to_u16(), Some(4));

        assert!(matches!(
            parse_file(dir.path().join("missing.dcm")),
            Err(DicomError::Io(_))
        ));
    }
}
