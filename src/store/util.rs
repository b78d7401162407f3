use anyhow::{Context, Result};
use chrono::Local;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Timestamp written into `created_at` / `updated_at`.
pub const DISPLAY_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Suffix of a history id.
pub const ID_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
/// Name of a migration backup directory.
pub const BACKUP_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn now_display_stamp() -> String {
    Local::now().format(DISPLAY_STAMP_FORMAT).to_string()
}

pub fn now_id_stamp() -> String {
    Local::now().format(ID_STAMP_FORMAT).to_string()
}

pub fn now_backup_stamp() -> String {
    Local::now().format(BACKUP_STAMP_FORMAT).to_string()
}

pub fn file_hash(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Truncate `input` to at most `max_chars` characters, stripping control
/// characters and appending `…` when truncated.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() > max_chars {
        let mut s: String = clean.chars().take(max_chars).collect();
        s.push('…');
        s
    } else {
        clean
    }
}
