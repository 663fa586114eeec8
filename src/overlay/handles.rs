use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};

use crate::overlay::file_handle::OpenHandle;
use crate::overlay::path_resolver::{is_root, validate_virtual_path};
use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::{
    EntryKind, LayerType, OpenDisposition, OpenInfo, OpenRequest, RequestContext,
};
use crate::overlay::OverlayFs;

impl OverlayFs {
    /// Route an open/create to a layer and bind the result to `ctx`.
    ///
    /// Routing, in order:
    /// 1. create-family dispositions open an existing entry in place
    ///    (overlay preferred) read-write, or create it in the overlay;
    /// 2. write intent always targets the overlay path;
    /// 3. no data access yields a metadata-only handle;
    /// 4. everything else opens the winning layer read-only.
    pub fn open_or_create(
        &self,
        virtual_path: &str,
        ctx: RequestContext,
        request: OpenRequest,
    ) -> FsResult<OpenInfo> {
        tracing::debug!(
            "open_or_create(path={:?}, {}, access={:?}, disposition={:?}, directory={})",
            virtual_path,
            ctx,
            request.access,
            request.disposition,
            request.directory
        );

        if virtual_path.trim().is_empty() {
            return Err(FsError::InvalidName);
        }
        validate_virtual_path(virtual_path)?;

        let (handle, info) = if is_root(virtual_path) {
            self.open_root(request)?
        } else if request.disposition.is_create_family() {
            self.open_create_family(virtual_path, request)?
        } else if request.access.wants_write() {
            self.open_for_write(virtual_path, request)?
        } else if !request.access.has_data_access() {
            self.open_metadata_only(virtual_path, request)?
        } else {
            self.open_for_read(virtual_path)?
        };

        if self.handles.attach(ctx, handle).is_some() {
            tracing::warn!("open_or_create: {} already had a handle, replaced", ctx);
        }

        tracing::debug!("open_or_create: {} -> {:?}", ctx, info);
        Ok(info)
    }

    fn open_root(&self, request: OpenRequest) -> FsResult<(OpenHandle, OpenInfo)> {
        if request.disposition == OpenDisposition::CreateNew {
            return Err(FsError::FileExists);
        }

        let handle = OpenHandle::directory(
            Some(LayerType::Overlay),
            Some(self.resolver.overlay_path("")),
        );
        Ok((
            handle,
            OpenInfo {
                is_directory: true,
                layer: None,
                created: false,
            },
        ))
    }

    fn open_create_family(
        &self,
        virtual_path: &str,
        request: OpenRequest,
    ) -> FsResult<(OpenHandle, OpenInfo)> {
        let existing = match self.resolver.resolve(virtual_path) {
            Ok(entry) => entry.winner(),
            Err(FsError::NotFound) | Err(FsError::PathNotFound) => None,
            Err(e) => return Err(e),
        };

        let Some((layer, kind)) = existing else {
            return self.create_in_overlay(virtual_path, request);
        };

        if request.disposition == OpenDisposition::CreateNew {
            return Err(FsError::FileExists);
        }

        let physical = self.resolver.layer_path(layer, virtual_path);
        match kind {
            EntryKind::Directory => Ok((
                OpenHandle::directory(Some(layer), Some(physical)),
                OpenInfo {
                    is_directory: true,
                    layer: Some(layer),
                    created: false,
                },
            )),
            EntryKind::File if request.directory => {
                tracing::debug!(
                    "open_or_create: {:?} is a file in the {} layer, not a directory",
                    virtual_path,
                    layer.name()
                );
                Err(FsError::AccessDenied)
            }
            EntryKind::File => {
                tracing::debug!(
                    "open_or_create: opening existing {} in place ({} layer)",
                    physical.display(),
                    layer.name()
                );
                let file = disposition_options(request.disposition)
                    .open(&physical)
                    .map_err(|e| FsError::from_io_at(&e, &physical))?;
                Ok((
                    OpenHandle::file(layer, physical, file),
                    OpenInfo {
                        is_directory: false,
                        layer: Some(layer),
                        created: false,
                    },
                ))
            }
        }
    }

    fn create_in_overlay(
        &self,
        virtual_path: &str,
        request: OpenRequest,
    ) -> FsResult<(OpenHandle, OpenInfo)> {
        let physical = self.resolver.overlay_path(virtual_path);
        tracing::debug!(
            "open_or_create: creating {} in overlay at {}",
            if request.directory { "directory" } else { "file" },
            physical.display()
        );

        if request.directory {
            fs::create_dir(&physical).map_err(|e| FsError::from_io_at(&e, &physical))?;
            return Ok((
                OpenHandle::directory(Some(LayerType::Overlay), Some(physical)),
                OpenInfo {
                    is_directory: true,
                    layer: Some(LayerType::Overlay),
                    created: true,
                },
            ));
        }

        let file = disposition_options(request.disposition)
            .open(&physical)
            .map_err(|e| FsError::from_io_at(&e, &physical))?;
        Ok((
            OpenHandle::file(LayerType::Overlay, physical, file),
            OpenInfo {
                is_directory: false,
                layer: Some(LayerType::Overlay),
                created: true,
            },
        ))
    }

    fn open_for_write(
        &self,
        virtual_path: &str,
        request: OpenRequest,
    ) -> FsResult<(OpenHandle, OpenInfo)> {
        let physical = self.resolver.overlay_path(virtual_path);

        if physical.is_dir() {
            return Ok((
                OpenHandle::directory(Some(LayerType::Overlay), Some(physical)),
                OpenInfo {
                    is_directory: true,
                    layer: Some(LayerType::Overlay),
                    created: false,
                },
            ));
        }

        let file = disposition_options(request.disposition)
            .open(&physical)
            .map_err(|e| FsError::from_io_at(&e, &physical))?;
        Ok((
            OpenHandle::file(LayerType::Overlay, physical, file),
            OpenInfo {
                is_directory: false,
                layer: Some(LayerType::Overlay),
                created: false,
            },
        ))
    }

    /// No descriptor is opened, so the entry need not exist; an absent entry
    /// takes its kind from the request.
    fn open_metadata_only(
        &self,
        virtual_path: &str,
        request: OpenRequest,
    ) -> FsResult<(OpenHandle, OpenInfo)> {
        let is_directory = match self.resolver.resolve(virtual_path) {
            Ok(entry) => entry.is_directory(),
            Err(FsError::NotFound) | Err(FsError::PathNotFound) => {
                tracing::debug!(
                    "open_or_create: metadata-only open of absent {:?}",
                    virtual_path
                );
                request.directory
            }
            Err(e) => return Err(e),
        };
        Ok((
            OpenHandle::metadata_only(),
            OpenInfo {
                is_directory,
                layer: None,
                created: false,
            },
        ))
    }

    fn open_for_read(&self, virtual_path: &str) -> FsResult<(OpenHandle, OpenInfo)> {
        let (physical, layer, kind) = self.resolver.winning_path(virtual_path)?;

        if kind == EntryKind::Directory {
            return Ok((
                OpenHandle::directory(Some(layer), Some(physical)),
                OpenInfo {
                    is_directory: true,
                    layer: Some(layer),
                    created: false,
                },
            ));
        }

        let file = File::open(&physical).map_err(|e| FsError::from_io_at(&e, &physical))?;
        Ok((
            OpenHandle::file(layer, physical, file),
            OpenInfo {
                is_directory: false,
                layer: Some(layer),
                created: false,
            },
        ))
    }

    /// Read into `buffer` at `offset` through the descriptor bound to `ctx`.
    ///
    /// In paged-I/O mode the request is clamped to the bytes remaining in
    /// the stream; otherwise the full buffer is requested and a short read
    /// only happens at end of file.
    pub fn read(
        &self,
        ctx: RequestContext,
        buffer: &mut [u8],
        offset: u64,
        paging_io: bool,
    ) -> FsResult<usize> {
        tracing::debug!(
            "read({}, offset={}, len={}, paging_io={})",
            ctx,
            offset,
            buffer.len(),
            paging_io
        );

        // Clone the descriptor Arc so the handle table is not locked during I/O.
        let file_arc = self.handles.file(ctx)?;
        let mut file = file_arc.lock();

        let mut wanted = buffer.len();
        if paging_io {
            let stream_len = file.metadata().map_err(|e| FsError::from_io(&e))?.len();
            wanted = clamp_paged_read(wanted, stream_len, offset);
        }

        file.seek(SeekFrom::Start(offset)).map_err(|e| {
            tracing::error!("read: seek failed - {}", e);
            FsError::from_io(&e)
        })?;

        let mut total = 0;
        while total < wanted {
            match file.read(&mut buffer[total..wanted]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("read: read failed - {}", e);
                    return Err(FsError::from_io(&e));
                }
            }
        }

        tracing::trace!("read: {} -> {} bytes", ctx, total);
        Ok(total)
    }

    /// Write all of `data` at `offset`, extending the stream as needed.
    pub fn write(&self, ctx: RequestContext, data: &[u8], offset: u64) -> FsResult<usize> {
        tracing::debug!("write({}, offset={}, len={})", ctx, offset, data.len());

        let file_arc = self.handles.file(ctx)?;
        let mut file = file_arc.lock();

        file.seek(SeekFrom::Start(offset)).map_err(|e| {
            tracing::error!("write: seek failed - {}", e);
            FsError::from_io(&e)
        })?;
        file.write_all(data).map_err(|e| {
            tracing::error!("write: write failed - {}", e);
            FsError::from_io(&e)
        })?;

        Ok(data.len())
    }

    /// Push buffered data for `ctx` down to storage. Handles without a
    /// descriptor have nothing to flush.
    pub fn flush(&self, ctx: RequestContext) -> FsResult<()> {
        tracing::debug!("flush({})", ctx);

        let Some(file_arc) = self.handles.try_file(ctx) else {
            return if self.handles.contains(ctx) {
                Ok(())
            } else {
                Err(FsError::Error)
            };
        };

        let mut file = file_arc.lock();
        file.flush()
            .and_then(|()| file.sync_all())
            .map_err(|e| space_error(&e, "flush"))
    }

    pub fn set_end_of_file(&self, ctx: RequestContext, length: u64) -> FsResult<()> {
        tracing::debug!("set_end_of_file({}, length={})", ctx, length);
        let file_arc = self.handles.file(ctx)?;
        let file = file_arc.lock();
        file.set_len(length)
            .map_err(|e| space_error(&e, "set_end_of_file"))
    }

    /// Resize the stream to `length`, same as [`OverlayFs::set_end_of_file`].
    pub fn set_allocation_size(&self, ctx: RequestContext, length: u64) -> FsResult<()> {
        tracing::debug!("set_allocation_size({}, length={})", ctx, length);
        let file_arc = self.handles.file(ctx)?;
        let file = file_arc.lock();
        file.set_len(length)
            .map_err(|e| space_error(&e, "set_allocation_size"))
    }

    /// Take an exclusive byte-range lock; a `length` of 0 extends to EOF.
    ///
    /// Locks belong to the open file description, so two contexts on the
    /// same file conflict with each other even inside one process.
    pub fn lock_range(&self, ctx: RequestContext, offset: u64, length: u64) -> FsResult<()> {
        tracing::debug!("lock_range({}, offset={}, length={})", ctx, offset, length);
        let file_arc = self.handles.file(ctx)?;
        let file = file_arc.lock();

        // Read-only descriptors cannot hold write locks; fall back to a
        // shared lock, which still conflicts with every exclusive holder.
        match set_range_lock(&file, libc::F_WRLCK as libc::c_short, offset, length) {
            Err(Errno::EBADF) => {
                set_range_lock(&file, libc::F_RDLCK as libc::c_short, offset, length)
            }
            other => other,
        }
        .map_err(lock_error)
    }

    pub fn unlock_range(&self, ctx: RequestContext, offset: u64, length: u64) -> FsResult<()> {
        tracing::debug!("unlock_range({}, offset={}, length={})", ctx, offset, length);
        let file_arc = self.handles.file(ctx)?;
        let file = file_arc.lock();
        set_range_lock(&file, libc::F_UNLCK as libc::c_short, offset, length).map_err(lock_error)
    }

    /// Dispose whatever is bound to `ctx`. Safe to call more than once.
    pub fn cleanup(&self, ctx: RequestContext) {
        if let Some(handle) = self.handles.detach(ctx) {
            tracing::debug!(
                "cleanup({}): released handle on {:?} ({} layer)",
                ctx,
                handle.physical_path,
                handle.layer.map_or("no", |layer| layer.name())
            );
        }
    }

    pub fn close(&self, ctx: RequestContext) {
        tracing::debug!("close({})", ctx);
        self.cleanup(ctx);
    }
}

/// Read-write options honouring the caller's disposition.
fn disposition_options(disposition: OpenDisposition) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true).write(true);

    match disposition {
        OpenDisposition::CreateNew => {
            options.create_new(true);
        }
        OpenDisposition::Create => {
            options.create(true).truncate(true);
        }
        OpenDisposition::OpenOrCreate => {
            options.create(true);
        }
        OpenDisposition::Truncate => {
            options.truncate(true);
        }
        OpenDisposition::Append => {
            options.append(true);
        }
        OpenDisposition::Open => {}
    }

    options
}

/// Length of a paged read: never past the end of the stream.
pub(crate) fn clamp_paged_read(requested: usize, stream_len: u64, offset: u64) -> usize {
    let remaining = stream_len.saturating_sub(offset);
    usize::try_from(remaining).map_or(requested, |remaining| requested.min(remaining))
}

fn space_error(e: &io::Error, operation: &str) -> FsError {
    tracing::warn!("{}: {}", operation, e);
    match FsError::from_io(e) {
        FsError::DiskFull => FsError::DiskFull,
        FsError::AccessDenied => FsError::AccessDenied,
        _ => FsError::Error,
    }
}

fn lock_error(errno: Errno) -> FsError {
    match errno {
        Errno::EAGAIN | Errno::EACCES => FsError::AccessDenied,
        other => FsError::from_io(&io::Error::from(other)),
    }
}

fn set_range_lock(
    file: &File,
    lock_type: libc::c_short,
    offset: u64,
    length: u64,
) -> Result<(), Errno> {
    // SAFETY: `flock` is a plain C struct; all-zero is a valid value and
    // leaves l_pid at 0 as open-file-description locks require.
    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = lock_type;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    lock.l_start = libc::off_t::try_from(offset).map_err(|_| Errno::EINVAL)?;
    lock.l_len = libc::off_t::try_from(length).map_err(|_| Errno::EINVAL)?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    let arg = FcntlArg::F_OFD_SETLK(&lock);
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let arg = FcntlArg::F_SETLK(&lock);

    fcntl(file.as_raw_fd(), arg).map(|_| ())
}
