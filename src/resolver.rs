use crate::model::{DataElement, DataSet, Tag, Vr};
use crate::{CommonResult, DicomError, DICTIONARY};

/// Maps a dictionary keyword (`PatientName`) to its tag. Exact and
/// case-sensitive.
pub fn resolve_name(name: &str) -> CommonResult<Tag> {
    DICTIONARY
        .by_keyword(name)
        .map(|entry| entry.tag)
        .ok_or_else(|| DicomError::UnknownTagName(name.to_string()))
}

pub fn find_element(dataset: &DataSet, tag: Tag) -> CommonResult<&DataElement> {
    dataset.get(tag).ok_or(DicomError::TagNotFound(tag))
}

/// Resolves the name before looking at the data set, so an unknown name
/// never reaches it.
pub fn find_element_by_name<'a>(dataset: &'a DataSet, name: &str) -> CommonResult<&'a DataElement> {
    let tag = resolve_name(name)?;
    find_element(dataset, tag)
}

pub fn tag_name(tag: Tag) -> Option<&'static str> {
    DICTIONARY.by_tag(tag).map(|entry| entry.keyword.as_str())
}

/// VR of an element in an implicit VR stream: group lengths are UL,
/// anything the dictionary does not know is UN.
pub fn implicit_vr(tag: Tag) -> Vr {
    if tag.element() == 0x0000 {
        return Vr::UL;
    }
    DICTIONARY.by_tag(tag).map(|entry| entry.vr).unwrap_or(Vr::UN)
}
