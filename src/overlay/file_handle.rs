use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::{LayerType, RequestContext};

#[derive(Debug)]
pub(crate) enum HandleTarget {
    /// An OS descriptor on exactly one layer.
    File(Arc<Mutex<File>>),
    /// Directory opens never hold a descriptor.
    Directory,
    /// Opened without data access; no descriptor.
    MetadataOnly,
}

/// State attached to one request context between open and close.
#[derive(Debug)]
pub(crate) struct OpenHandle {
    pub layer: Option<LayerType>,
    pub physical_path: Option<PathBuf>,
    pub target: HandleTarget,
}

impl OpenHandle {
    pub fn file(layer: LayerType, physical_path: PathBuf, file: File) -> Self {
        OpenHandle {
            layer: Some(layer),
            physical_path: Some(physical_path),
            target: HandleTarget::File(Arc::new(Mutex::new(file))),
        }
    }

    pub fn directory(layer: Option<LayerType>, physical_path: Option<PathBuf>) -> Self {
        OpenHandle {
            layer,
            physical_path,
            target: HandleTarget::Directory,
        }
    }

    pub fn metadata_only() -> Self {
        OpenHandle {
            layer: None,
            physical_path: None,
            target: HandleTarget::MetadataOnly,
        }
    }
}

/// Request context → open handle.
///
/// The table lock is only held long enough to insert, remove, or clone the
/// descriptor `Arc`; I/O runs on the per-file mutex so slow disk access never
/// blocks opens and closes on other contexts.
#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    handles: RwLock<HashMap<RequestContext, OpenHandle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable::default()
    }

    /// Attach a handle to `ctx`, returning any handle it displaced.
    pub fn attach(&self, ctx: RequestContext, handle: OpenHandle) -> Option<OpenHandle> {
        self.handles.write().insert(ctx, handle)
    }

    pub fn detach(&self, ctx: RequestContext) -> Option<OpenHandle> {
        self.handles.write().remove(&ctx)
    }

    /// Descriptor bound to `ctx`; `Error` if nothing (or no file) is bound.
    pub fn file(&self, ctx: RequestContext) -> FsResult<Arc<Mutex<File>>> {
        let handles = self.handles.read();
        match handles.get(&ctx).map(|h| &h.target) {
            Some(HandleTarget::File(file)) => Ok(Arc::clone(file)),
            Some(_) => {
                tracing::debug!("{}: handle holds no descriptor", ctx);
                Err(FsError::Error)
            }
            None => {
                tracing::debug!("{}: no handle attached", ctx);
                Err(FsError::Error)
            }
        }
    }

    /// Descriptor bound to `ctx`, if any; never an error.
    pub fn try_file(&self, ctx: RequestContext) -> Option<Arc<Mutex<File>>> {
        self.file(ctx).ok()
    }

    pub fn contains(&self, ctx: RequestContext) -> bool {
        self.handles.read().contains_key(&ctx)
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }
}
