//! ImageJ-style stack description.
//!
//! ImageJ stores stack layout as `key=value` lines in the first page's
//! `ImageDescription` tag:
//!
//! ```text
//! ImageJ=1.11a
//! images=2
//! slices=2
//! ```
//!
//! We write this block for every stack and read `images=` back in the legacy
//! loader. Unknown keys are kept so other writers' blocks round-trip through
//! [`parse`].

use std::collections::BTreeMap;

/// Version string written after `ImageJ=`.
const WRITER_VERSION: &str = "1.11a";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackDescription {
    pub images: Option<u64>,
    pub slices: Option<u64>,
    pub extra: BTreeMap<String, String>,
}

/// Build the description for a stack of `depth` planes.
pub fn format_description(depth: u64) -> String {
    let mut out = format!("ImageJ={WRITER_VERSION}\nimages={depth}\n");
    if depth > 1 {
        out.push_str(&format!("slices={depth}\n"));
    }
    out
}

/// Parse an `ImageDescription` value. Returns `None` unless the text starts
/// with the `ImageJ=` marker.
pub fn parse(text: &str) -> Option<StackDescription> {
    let text = text.trim_end_matches('\0');
    if !text.starts_with("ImageJ=") {
        return None;
    }

    let mut desc = StackDescription::default();
    for line in text.lines().skip(1) {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "images" => desc.images = value.parse().ok(),
            "slices" => desc.slices = value.parse().ok(),
            _ => {
                desc.extra.insert(key.to_string(), value.to_string());
            }
        }
    }
    Some(desc)
}
