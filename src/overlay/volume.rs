use bitflags::bitflags;
use std::path::Path;

use crate::overlay::status::{FsError, FsResult};

bitflags! {
    /// Filesystem capability flags reported with the volume information.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileSystemFeatures: u32 {
        const CASE_SENSITIVE_SEARCH = 0x0000_0001;
        const CASE_PRESERVED_NAMES = 0x0000_0002;
        const UNICODE_ON_DISK = 0x0000_0004;
        const PERSISTENT_ACLS = 0x0000_0008;
        const SUPPORTS_REMOTE_STORAGE = 0x0000_0100;
    }
}

/// Static description of the mounted volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub label: String,
    pub filesystem_name: String,
    pub max_component_length: u32,
    pub features: FileSystemFeatures,
}

impl Default for VolumeInfo {
    fn default() -> Self {
        VolumeInfo {
            label: "OverlayFS".to_string(),
            filesystem_name: "NTFS".to_string(),
            max_component_length: 255,
            features: FileSystemFeatures::CASE_PRESERVED_NAMES
                | FileSystemFeatures::CASE_SENSITIVE_SEARCH
                | FileSystemFeatures::PERSISTENT_ACLS
                | FileSystemFeatures::SUPPORTS_REMOTE_STORAGE
                | FileSystemFeatures::UNICODE_ON_DISK,
        }
    }
}

/// Space figures, in bytes, for the volume holding the overlay layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpace {
    /// Available to an unprivileged caller.
    pub free_bytes_available: u64,
    pub total_bytes: u64,
    pub total_free_bytes: u64,
}

/// Query the volume that `root` lives on.
pub fn free_space(root: &Path) -> FsResult<FreeSpace> {
    let query = || -> std::io::Result<FreeSpace> {
        Ok(FreeSpace {
            free_bytes_available: fs2::available_space(root)?,
            total_bytes: fs2::total_space(root)?,
            total_free_bytes: fs2::free_space(root)?,
        })
    };

    query().map_err(|e| {
        tracing::warn!("free_space: statvfs on {} failed: {}", root.display(), e);
        FsError::from_io(&e)
    })
}
