mod convert;
mod inode;

use convert::{create_flags_to_request, information_to_fileattr, open_flags_to_request};
use inode::InodeManager;

use fuser::{
    FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::overlay::path_resolver::join;
use crate::overlay::status::{FsError, FsResult};
use crate::overlay::types::{
    AccessMask, FileAttributes, OpenDisposition, OpenRequest, RequestContext, TimeUpdate,
};
use crate::overlay::FileSystemOperations;

const RENAME_NOREPLACE: u32 = 1;
const RENAME_EXCHANGE: u32 = 2;

/// Block size reported through statfs.
const STATFS_BLOCK_SIZE: u64 = 4096;

/// Context used by calls that arrive without a FUSE file handle. File
/// handles start at 1, so it is never bound to an open handle.
const UNBOUND: RequestContext = RequestContext(0);

thread_local! {
    /// Reused per-thread buffer for read replies, so each read does not
    /// allocate a fresh Vec.
    static READ_BUFFER: RefCell<Vec<u8>> = RefCell::new(Vec::with_capacity(128 * 1024));
}

/// FUSE front end for any [`FileSystemOperations`] implementation.
///
/// Kernel inode numbers are mapped to virtual paths, and every FUSE file
/// handle doubles as the request context of one open → close sequence.
pub struct UnionFuse<F: FileSystemOperations> {
    ops: Arc<F>,
    inodes: InodeManager,
    next_fh: Mutex<u64>,
    mount_point: PathBuf,
    /// Attribute and entry cache timeout handed to the kernel.
    ttl: Duration,
}

impl<F: FileSystemOperations> UnionFuse<F> {
    pub fn new(ops: Arc<F>, mount_point: PathBuf, ttl_secs: u64) -> Self {
        UnionFuse {
            ops,
            inodes: InodeManager::new(),
            next_fh: Mutex::new(1),
            mount_point,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn alloc_fh(&self) -> u64 {
        let mut next = self.next_fh.lock();
        let fh = *next;
        // Skip 0 on wrap-around; it is reserved for unbound calls.
        *next = next.wrapping_add(1).max(1);
        fh
    }

    fn path_of(&self, ino: u64) -> FsResult<String> {
        self.inodes.path(ino).ok_or_else(|| {
            tracing::warn!("inode {} not found in table", ino);
            FsError::NotFound
        })
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> FsResult<String> {
        let parent_path = self.path_of(parent)?;
        let name = name.to_str().ok_or(FsError::InvalidName)?;
        Ok(join(&parent_path, name))
    }

    /// Stat `path` and register it with the inode table.
    fn entry_attr(&self, req: &Request, path: &str) -> FsResult<fuser::FileAttr> {
        let info = self.ops.get_metadata(path)?;
        let ino = self.inodes.get_or_insert(path);
        Ok(information_to_fileattr(&info, ino, req.uid(), req.gid()))
    }

    fn truncate(&self, path: &str, fh: Option<u64>, size: u64) -> FsResult<()> {
        if let Some(fh) = fh {
            return self.ops.set_end_of_file(RequestContext(fh), size);
        }

        let ctx = RequestContext(self.alloc_fh());
        self.ops.open_or_create(
            path,
            ctx,
            OpenRequest::new(AccessMask::WRITE_DATA, OpenDisposition::Open),
        )?;
        let result = self.ops.set_end_of_file(ctx, size);
        self.ops.close(ctx);
        result
    }
}

fn time_or_now(time: TimeOrNow) -> SystemTime {
    match time {
        TimeOrNow::SpecificTime(t) => t,
        TimeOrNow::Now => SystemTime::now(),
    }
}

impl<F: FileSystemOperations> Filesystem for UnionFuse<F> {
    fn init(
        &mut self,
        _req: &Request,
        config: &mut KernelConfig,
    ) -> std::result::Result<(), libc::c_int> {
        if let Err(unsupported) = config.add_capabilities(fuser::consts::FUSE_POSIX_LOCKS) {
            tracing::debug!("init: kernel lacks capabilities {:#x}", unsupported);
        }
        self.ops
            .mounted(&self.mount_point)
            .map_err(|e| e.to_errno())
    }

    fn destroy(&mut self) {
        if let Err(e) = self.ops.unmounted() {
            tracing::warn!("destroy: unmount notification failed: {}", e);
        }
    }

    fn lookup(&mut self, req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        tracing::debug!("lookup(parent={}, name={:?})", parent, name);
        let result = self
            .child_path(parent, name)
            .and_then(|path| self.entry_attr(req, &path));

        match result {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getattr(&mut self, req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        tracing::debug!("getattr(ino={})", ino);
        let result = self
            .path_of(ino)
            .and_then(|path| self.ops.get_metadata(&path))
            .map(|info| information_to_fileattr(&info, ino, req.uid(), req.gid()));

        match result {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn setattr(
        &mut self,
        req: &Request,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        tracing::debug!(
            "setattr(ino={}, mode={:?}, size={:?}, fh={:?})",
            ino,
            mode,
            size,
            fh
        );

        let result = (|| -> FsResult<fuser::FileAttr> {
            let path = self.path_of(ino)?;

            if let Some(size) = size {
                self.truncate(&path, fh, size)?;
            }

            if let Some(mode) = mode {
                let attributes = if mode & 0o222 == 0 {
                    FileAttributes::READONLY
                } else {
                    FileAttributes::NORMAL
                };
                self.ops.set_attributes(&path, attributes)?;
            }

            let times = TimeUpdate {
                creation: crtime,
                last_access: atime.map(time_or_now),
                last_write: mtime.map(time_or_now),
            };
            if !times.is_empty() || times.creation.is_some() {
                let ctx = fh.map_or(UNBOUND, RequestContext);
                self.ops.set_times(&path, ctx, times)?;
            }

            let info = self.ops.get_metadata(&path)?;
            Ok(information_to_fileattr(&info, ino, req.uid(), req.gid()))
        })();

        match result {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        tracing::debug!("open(ino={}, flags={:#x})", ino, flags);
        let fh = self.alloc_fh();

        let result = self.path_of(ino).and_then(|path| {
            self.ops
                .open_or_create(&path, RequestContext(fh), open_flags_to_request(flags))
        });

        match result {
            Ok(_) => reply.opened(fh, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        tracing::debug!("opendir(ino={})", ino);
        let fh = self.alloc_fh();

        let request = OpenRequest::new(AccessMask::GENERIC_READ, OpenDisposition::Open).directory();
        let result = self
            .path_of(ino)
            .and_then(|path| self.ops.open_or_create(&path, RequestContext(fh), request));

        match result {
            Ok(info) if info.is_directory => reply.opened(fh, 0),
            Ok(_) => {
                self.ops.close(RequestContext(fh));
                reply.error(libc::ENOTDIR);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        tracing::debug!("readdir(ino={}, offset={})", ino, offset);

        let (dir_path, listing) = match self
            .path_of(ino)
            .and_then(|path| self.ops.list_children(&path).map(|l| (path, l)))
        {
            Ok(found) => found,
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        };

        let parent_ino = match dir_path.rsplit_once('/') {
            Some(("", _)) | None => fuser::FUSE_ROOT_ID,
            Some((parent, _)) => self.inodes.get_or_insert(parent),
        };

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];
        for info in listing.iter() {
            let child_ino = self.inodes.get_or_insert(&join(&dir_path, &info.file_name));
            let kind = if info.is_directory() {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            entries.push((child_ino, kind, info.file_name.clone()));
        }

        for (idx, (child_ino, kind, name)) in entries
            .into_iter()
            .enumerate()
            .skip(offset.max(0) as usize)
        {
            if reply.add(child_ino, (idx + 1) as i64, kind, &name) {
                break;
            }
        }

        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.ops.close(RequestContext(fh));
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        tracing::debug!(
            "read(ino={}, fh={}, offset={}, size={})",
            ino,
            fh,
            offset,
            size
        );

        READ_BUFFER.with(|buffer| {
            let mut buf = buffer.borrow_mut();
            buf.resize(size as usize, 0u8);

            match self
                .ops
                .read(RequestContext(fh), &mut buf[..], offset.max(0) as u64, false)
            {
                Ok(n) => reply.data(&buf[..n]),
                Err(e) => reply.error(e.to_errno()),
            }
        });
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        tracing::debug!(
            "write(ino={}, fh={}, offset={}, len={})",
            ino,
            fh,
            offset,
            data.len()
        );

        match self
            .ops
            .write(RequestContext(fh), data, offset.max(0) as u64)
        {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn flush(&mut self, _req: &Request, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match self.ops.flush(RequestContext(fh)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn fsync(&mut self, _req: &Request, _ino: u64, fh: u64, _datasync: bool, reply: ReplyEmpty) {
        match self.ops.flush(RequestContext(fh)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let ctx = RequestContext(fh);
        self.ops.cleanup(ctx);
        self.ops.close(ctx);
        reply.ok();
    }

    fn create(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        tracing::debug!("create(parent={}, name={:?}, flags={:#x})", parent, name, flags);
        let fh = self.alloc_fh();
        let ctx = RequestContext(fh);

        let result = self.child_path(parent, name).and_then(|path| {
            self.ops
                .open_or_create(&path, ctx, create_flags_to_request(flags))?;
            self.entry_attr(req, &path)
        });

        match result {
            Ok(attr) => reply.created(&self.ttl, &attr, 0, fh, 0),
            Err(e) => {
                self.ops.close(ctx);
                reply.error(e.to_errno());
            }
        }
    }

    fn mkdir(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        tracing::debug!("mkdir(parent={}, name={:?})", parent, name);
        let ctx = RequestContext(self.alloc_fh());
        let request =
            OpenRequest::new(AccessMask::GENERIC_READ, OpenDisposition::CreateNew).directory();

        let result = self.child_path(parent, name).and_then(|path| {
            self.ops.open_or_create(&path, ctx, request)?;
            self.ops.close(ctx);
            self.entry_attr(req, &path)
        });

        match result {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        tracing::debug!("unlink(parent={}, name={:?})", parent, name);
        match self
            .child_path(parent, name)
            .and_then(|path| self.ops.delete_file(&path))
        {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        tracing::debug!("rmdir(parent={}, name={:?})", parent, name);
        match self
            .child_path(parent, name)
            .and_then(|path| self.ops.delete_directory(&path))
        {
            Ok(()) => reply.ok(),
            Err(FsError::Error) => reply.error(libc::ENOTEMPTY),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        tracing::debug!(
            "rename(parent={}, name={:?}, newparent={}, newname={:?}, flags={:#x})",
            parent,
            name,
            newparent,
            newname,
            flags
        );

        if flags & RENAME_EXCHANGE != 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let replace = flags & RENAME_NOREPLACE == 0;

        let result = self.child_path(parent, name).and_then(|old_path| {
            let new_path = self.child_path(newparent, newname)?;
            self.ops.move_file(&old_path, &new_path, replace, UNBOUND)?;
            self.inodes.rename(&old_path, &new_path);
            Ok(())
        });

        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let volume = self.ops.get_volume_info();
        match self.ops.get_free_space() {
            Ok(space) => reply.statfs(
                space.total_bytes / STATFS_BLOCK_SIZE,
                space.total_free_bytes / STATFS_BLOCK_SIZE,
                space.free_bytes_available / STATFS_BLOCK_SIZE,
                0,
                0,
                STATFS_BLOCK_SIZE as u32,
                volume.max_component_length,
                STATFS_BLOCK_SIZE as u32,
            ),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn setlk(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        _lock_owner: u64,
        start: u64,
        end: u64,
        typ: i32,
        _pid: u32,
        _sleep: bool,
        reply: ReplyEmpty,
    ) {
        tracing::debug!(
            "setlk(ino={}, fh={}, start={}, end={}, typ={})",
            ino,
            fh,
            start,
            end,
            typ
        );

        // The kernel reports "to end of file" as OFFSET_MAX.
        let length = if end >= i64::MAX as u64 {
            0
        } else {
            end.saturating_sub(start) + 1
        };

        let ctx = RequestContext(fh);
        let result = if typ == libc::F_UNLCK as i32 {
            self.ops.unlock_range(ctx, start, length)
        } else {
            self.ops.lock_range(ctx, start, length)
        };

        match result {
            Ok(()) => reply.ok(),
            Err(FsError::AccessDenied) => reply.error(libc::EAGAIN),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}
