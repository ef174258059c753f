//! Prefix recovery for corrupted JSON files.
//!
//! A corrupted file typically holds a complete document followed by garbage
//! (zero bytes, a stale second document from an interrupted overwrite). The
//! scanner finds where the first top-level object closes and keeps only that.

use std::ops::Range;

use serde_json::Value;
use tripkeep_core::has_required_keys;

use crate::codec::parse_document;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Byte range of the first balanced top-level object, if the buffer starts
/// with one after optional BOM and whitespace.
pub fn balanced_object_span(bytes: &[u8]) -> Option<Range<usize>> {
    let mut start = if bytes.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    };
    while start < bytes.len() && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start..start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the balanced prefix and accepts it only if it looks like a record.
pub fn recover_prefix(bytes: &[u8]) -> Option<Value> {
    let span = balanced_object_span(bytes)?;
    let document = parse_document(&bytes[span]).ok()?;
    has_required_keys(&document).then_some(document)
}
