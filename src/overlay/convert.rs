use std::fs::{self, Metadata};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::overlay::types::{FileAttributes, FileInformation};

/// Project OS attributes onto the bridge's attribute flags.
///
/// Only what a POSIX stat can express is reported: directories, read-only
/// files (no write bit at all), and dot-files as hidden.
pub(crate) fn metadata_to_attributes(meta: &Metadata, name: &str) -> FileAttributes {
    let mut attributes = FileAttributes::empty();

    if meta.is_dir() {
        attributes |= FileAttributes::DIRECTORY;
    }
    if meta.permissions().readonly() {
        attributes |= FileAttributes::READONLY;
    }
    if name.starts_with('.') {
        attributes |= FileAttributes::HIDDEN;
    }

    if attributes.is_empty() {
        FileAttributes::NORMAL
    } else {
        attributes
    }
}

pub(crate) fn metadata_to_information(meta: &Metadata, name: &str) -> FileInformation {
    let last_write_time = meta.modified().unwrap_or(UNIX_EPOCH);
    let last_access_time = meta.accessed().unwrap_or(last_write_time);
    let creation_time = meta.created().unwrap_or(last_write_time);

    FileInformation {
        file_name: name.to_string(),
        attributes: metadata_to_attributes(meta, name),
        creation_time,
        last_access_time,
        last_write_time,
        length: if meta.is_dir() { 0 } else { meta.len() },
    }
}

/// Stat a physical entry and project it, following symlinks.
pub(crate) fn path_to_information(path: &Path, name: &str) -> std::io::Result<FileInformation> {
    let meta = fs::metadata(path)?;
    Ok(metadata_to_information(&meta, name))
}

/// Record for the virtual root, which is never backed by a stat.
pub(crate) fn synthetic_root() -> FileInformation {
    let now = SystemTime::now();
    FileInformation {
        file_name: "/".to_string(),
        attributes: FileAttributes::DIRECTORY,
        creation_time: now,
        last_access_time: now,
        last_write_time: now,
        length: 0,
    }
}
