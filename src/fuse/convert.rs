use fuser::{FileAttr, FileType};

use crate::overlay::types::{
    AccessMask, FileAttributes, FileInformation, OpenDisposition, OpenRequest,
};

const BLOCK_SIZE: u32 = 512;

/// Project a virtual metadata record onto FUSE attributes.
///
/// Ownership is reported as the requesting user since the union does not
/// track owners; permission bits follow the `READONLY` attribute.
pub(crate) fn information_to_fileattr(
    info: &FileInformation,
    ino: u64,
    uid: u32,
    gid: u32,
) -> FileAttr {
    let is_dir = info.is_directory();
    let readonly = info.attributes.contains(FileAttributes::READONLY);

    let perm = match (is_dir, readonly) {
        (true, false) => 0o755,
        (true, true) => 0o555,
        (false, false) => 0o644,
        (false, true) => 0o444,
    };

    FileAttr {
        ino,
        size: info.length,
        blocks: info.length.div_ceil(BLOCK_SIZE as u64),
        atime: info.last_access_time,
        mtime: info.last_write_time,
        ctime: info.last_write_time,
        crtime: info.creation_time,
        kind: if is_dir {
            FileType::Directory
        } else {
            FileType::RegularFile
        },
        perm,
        nlink: if is_dir { 2 } else { 1 },
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn access_from_flags(flags: i32) -> AccessMask {
    match flags & libc::O_ACCMODE {
        libc::O_WRONLY => AccessMask::GENERIC_WRITE,
        libc::O_RDWR => AccessMask::GENERIC_READ | AccessMask::GENERIC_WRITE,
        _ => AccessMask::GENERIC_READ,
    }
}

/// Translate `open(2)` flags of an existing entry into an open request.
pub(crate) fn open_flags_to_request(flags: i32) -> OpenRequest {
    let access = access_from_flags(flags);

    let disposition = if !access.wants_write() {
        OpenDisposition::Open
    } else if flags & libc::O_TRUNC != 0 {
        OpenDisposition::Truncate
    } else if flags & libc::O_APPEND != 0 {
        OpenDisposition::Append
    } else {
        OpenDisposition::Open
    };

    OpenRequest::new(access, disposition)
}

/// Translate the flags of a FUSE `create` into a create-family request.
pub(crate) fn create_flags_to_request(flags: i32) -> OpenRequest {
    let disposition = if flags & libc::O_EXCL != 0 {
        OpenDisposition::CreateNew
    } else if flags & libc::O_TRUNC != 0 {
        OpenDisposition::Create
    } else {
        OpenDisposition::OpenOrCreate
    };

    OpenRequest::new(access_from_flags(flags), disposition)
}
