use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::fs::FileSystem;

pub const JSON_EXTENSION: &str = "json";
pub const TRIPS_DIR: &str = "trips";
pub const BACKUPS_DIR: &str = "backups";
pub const CORRUPTED_DIR: &str = "corrupted";
pub const CATALOG_FILE: &str = "backup-catalog.json";
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";
const PARSE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";
const TIMESTAMP_LEN: usize = 19;

/// On-disk layout of one store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub root: PathBuf,
    pub trips_dir: PathBuf,
    pub backups_dir: PathBuf,
    pub corrupted_dir: PathBuf,
    pub catalog_file: PathBuf,
}

impl StoragePaths {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            trips_dir: root.join(TRIPS_DIR),
            backups_dir: root.join(BACKUPS_DIR),
            corrupted_dir: root.join(CORRUPTED_DIR),
            catalog_file: root.join(CATALOG_FILE),
            root,
        }
    }
}

const STEM_ESCAPE: u8 = b'~';
const EMPTY_STEM: &str = "~";

/// Maps a record id onto a file stem that cannot escape its directory.
/// Bytes outside `[A-Za-z0-9_-]` are written as `~XX`, so distinct ids never
/// share a file and [`id_from_stem`] gets the id back.
pub fn file_stem(id: &str) -> String {
    if id.is_empty() {
        return EMPTY_STEM.into();
    }
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if is_plain_stem_byte(byte) {
            stem.push(char::from(byte));
        } else {
            stem.push(char::from(STEM_ESCAPE));
            stem.push_str(&format!("{:02X}", byte));
        }
    }
    stem
}

/// Inverse of [`file_stem`]. Stems it could not have produced yield `None`.
pub fn id_from_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut id = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if byte == STEM_ESCAPE {
            let hex = stem.get(idx + 1..idx + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
                return None;
            }
            let decoded = u8::from_str_radix(hex, 16).ok()?;
            if is_plain_stem_byte(decoded) {
                return None;
            }
            id.push(decoded);
            idx += 3;
        } else if is_plain_stem_byte(byte) {
            id.push(byte);
            idx += 1;
        } else {
            return None;
        }
    }
    if id.is_empty() {
        return None;
    }
    String::from_utf8(id).ok()
}

fn is_plain_stem_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format(FILE_TIMESTAMP_FORMAT).to_string()
}

/// Splits `<prefix>-<stem>-<timestamp>[_n].json` into stem and timestamp.
pub fn parse_stamped_name<'a>(
    file_name: &'a str,
    prefix: &str,
) -> Option<(&'a str, DateTime<Utc>)> {
    let trimmed = file_name.strip_suffix(&format!(".{}", JSON_EXTENSION))?;
    let rest = trimmed.strip_prefix(prefix)?.strip_prefix('-')?;
    let rest = match rest.rsplit_once('_') {
        Some((head, counter)) if is_digits(counter) && head.len() > TIMESTAMP_LEN => head,
        _ => rest,
    };
    if rest.len() <= TIMESTAMP_LEN + 1 {
        return None;
    }
    let (stem, stamp) = rest.split_at(rest.len() - TIMESTAMP_LEN);
    let stem = stem.strip_suffix('-')?;
    if stem.is_empty() {
        return None;
    }
    let compact = format!("{}.{}", &stamp[..15], &stamp[15..]);
    NaiveDateTime::parse_from_str(&compact, PARSE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| (stem, DateTime::from_naive_utc_and_offset(naive, Utc)))
}

/// First free `<base>.json`, `<base>_1.json`, ... inside `dir`.
pub fn unique_file(fs: &dyn FileSystem, dir: &Path, base: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", base, JSON_EXTENSION));
    if !fs.exists(&first) {
        return first;
    }
    let mut counter = 1usize;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", base, counter, JSON_EXTENSION));
        if !fs.exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}
