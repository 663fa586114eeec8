mod convert;
mod enumerate;
mod file_handle;
mod handles;
mod metadata;
pub mod mount;
mod mutation;
mod operations;
pub mod path_resolver;
pub mod security;
pub mod setup;
pub mod status;
pub mod types;
pub mod volume;

pub use enumerate::{DirectoryListing, SearchPattern};
pub use mount::{mount_union, MountSession};
pub use operations::FileSystemOperations;
pub use path_resolver::PathResolver;
pub use setup::build_overlay_fs;
pub use status::{FsError, FsResult, ResultCode};

use file_handle::HandleTable;
use security::{SecurityStore, XattrSecurityStore};
use volume::VolumeInfo;

/// The union of an overlay layer over a base layer.
///
/// Layer roots are fixed at construction. Per-request state lives in the
/// handle table keyed by request context, so one instance serves every
/// concurrent caller by shared reference.
#[derive(Debug)]
pub struct OverlayFs {
    pub(crate) resolver: PathResolver,
    pub(crate) handles: HandleTable,
    pub(crate) security: Box<dyn SecurityStore>,
    pub(crate) volume: VolumeInfo,
}

impl OverlayFs {
    /// Create a union over `resolver`'s layers, keeping security
    /// descriptors in extended attributes.
    pub fn new(resolver: PathResolver, volume: VolumeInfo) -> Self {
        OverlayFs {
            resolver,
            handles: HandleTable::new(),
            security: Box::new(XattrSecurityStore),
            volume,
        }
    }

    /// Replace the security descriptor backend.
    pub fn with_security_store(mut self, store: impl SecurityStore + 'static) -> Self {
        self.security = Box::new(store);
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Number of request contexts currently holding a handle.
    pub fn open_handle_count(&self) -> usize {
        self.handles.len()
    }
}
