//! Static attribute dictionary.
//!
//! The table is `tag_mapping.txt`, embedded at compile time, one
//! tab-separated line per attribute: `GGGG,EEEE  Keyword  VR`.
//! Repeating groups are written with `xx` (`60xx,3000`) and matched by regex.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use crate::model::{Tag, Vr};

#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryEntry {
    pub tag: Tag,
    pub keyword: String,
    pub vr: Vr,
}

#[derive(Debug, Default)]
pub struct TagDictionary {
    by_keyword: HashMap<String, DictionaryEntry>,
    full_match: HashMap<Tag, DictionaryEntry>,
    partial_match: Vec<(Regex, DictionaryEntry)>,
}

impl TagDictionary {
    /// Builds the dictionary from its text form. Malformed lines are logged
    /// and skipped.
    pub fn load(source: &str) -> Self {
        let mut dictionary = TagDictionary::default();

        for (number, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Err(reason) = dictionary.add_line(line) {
                warn!("tag mapping line {}: {}", number + 1, reason);
            }
        }

        dictionary
    }

    fn add_line(&mut self, line: &str) -> Result<(), String> {
        let columns = line.split('\t').collect::<Vec<_>>();
        let [standard_tag, keyword, vr] = columns[..] else {
            return Err(format!("expected 3 columns, found {}", columns.len()));
        };
        let vr = vr.parse::<Vr>()?;
        let standard_tag = standard_tag.to_ascii_uppercase();

        let (group, element) = standard_tag
            .split_once(',')
            .ok_or_else(|| format!("bad tag {standard_tag:?}"))?;

        if standard_tag.contains('X') {
            // repeating group: the base tag (xx = 00) is what the keyword resolves to
            let pattern = format!("^{}$", standard_tag.replace('X', "[0-9A-F]"));
            let regex = Regex::new(&pattern).map_err(|e| e.to_string())?;
            let entry = DictionaryEntry {
                tag: parse_tag(&group.replace('X', "0"), &element.replace('X', "0"))?,
                keyword: keyword.to_string(),
                vr,
            };
            self.by_keyword.insert(entry.keyword.clone(), entry.clone());
            self.partial_match.push((regex, entry));
        } else {
            let entry = DictionaryEntry {
                tag: parse_tag(group, element)?,
                keyword: keyword.to_string(),
                vr,
            };
            self.by_keyword.insert(entry.keyword.clone(), entry.clone());
            self.full_match.insert(entry.tag, entry);
        }

        Ok(())
    }

    /// Exact, case-sensitive keyword lookup.
    pub fn by_keyword(&self, keyword: &str) -> Option<&DictionaryEntry> {
        self.by_keyword.get(keyword)
    }

    pub fn by_tag(&self, tag: Tag) -> Option<&DictionaryEntry> {
        if let Some(entry) = self.full_match.get(&tag) {
            return Some(entry);
        }

        let formatted = format!("{:04X},{:04X}", tag.0, tag.1);
        self.partial_match
            .iter()
            .find(|(regex, _)| regex.is_match(&formatted))
            .map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.by_keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_keyword.is_empty()
    }
}

fn parse_tag(group: &str, element: &str) -> Result<Tag, String> {
    let group = u16::from_str_radix(group, 16).map_err(|e| format!("bad group {group:?}: {e}"))?;
    let element =
        u16::from_str_radix(element, 16).map_err(|e| format!("bad element {element:?}: {e}"))?;
    Ok(Tag(group, element))
}

/// Tags the pipeline refers to directly.
pub mod tags {
    use crate::model::Tag;

    pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
    pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
    pub const SPECIFIC_CHARACTER_SET: Tag = Tag(0x0008, 0x0005);
    pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
    pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
    pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
    pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
    pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
    pub const ROWS: Tag = Tag(0x0028, 0x0010);
    pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
    pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
    pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
    pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
    pub const WINDOW_CENTER: Tag = Tag(0x0028, 0x1050);
    pub const WINDOW_WIDTH: Tag = Tag(0x0028, 0x1051);
    pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
    pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
    pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

    pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
    pub const ITEM_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE00D);
    pub const SEQUENCE_DELIMITATION_ITEM: Tag = Tag(0xFFFE, 0xE0DD);
}
