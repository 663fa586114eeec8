use std::io;
use std::path::Path;
use thiserror::Error;

pub type FsResult<T> = std::result::Result<T, FsError>;

/// Failure kinds surfaced to the host bridge.
///
/// Every native error is folded into exactly one of these at the operation
/// boundary; the bridge never sees a raw OS error code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("file not found")]
    NotFound,

    #[error("path not found")]
    PathNotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("file exists")]
    FileExists,

    #[error("disk full")]
    DiskFull,

    #[error("invalid name")]
    InvalidName,

    #[error("error")]
    Error,

    #[error("not implemented")]
    NotImplemented,
}

/// Flat result code as reported back through the bridge, success included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    NotFound,
    PathNotFound,
    AccessDenied,
    FileExists,
    DiskFull,
    InvalidName,
    Error,
    NotImplemented,
}

impl<T> From<&FsResult<T>> for ResultCode {
    fn from(result: &FsResult<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Success,
            Err(e) => e.code(),
        }
    }
}

impl FsError {
    pub fn code(&self) -> ResultCode {
        match self {
            FsError::NotFound => ResultCode::NotFound,
            FsError::PathNotFound => ResultCode::PathNotFound,
            FsError::AccessDenied => ResultCode::AccessDenied,
            FsError::FileExists => ResultCode::FileExists,
            FsError::DiskFull => ResultCode::DiskFull,
            FsError::InvalidName => ResultCode::InvalidName,
            FsError::Error => ResultCode::Error,
            FsError::NotImplemented => ResultCode::NotImplemented,
        }
    }

    /// Convert to POSIX errno for the FUSE binding.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound | FsError::PathNotFound => libc::ENOENT,
            FsError::AccessDenied => libc::EACCES,
            FsError::FileExists => libc::EEXIST,
            FsError::DiskFull => libc::ENOSPC,
            FsError::InvalidName => libc::EINVAL,
            FsError::Error => libc::EIO,
            FsError::NotImplemented => libc::ENOSYS,
        }
    }

    /// Map std::io::Error to the result taxonomy.
    ///
    /// The raw OS error code is consulted first since it is the most precise
    /// signal; the stable `ErrorKind` is the fallback.
    pub fn from_io(e: &io::Error) -> Self {
        if let Some(code) = e.raw_os_error() {
            return match code {
                libc::ENOENT => FsError::NotFound,
                libc::ENOTDIR => FsError::PathNotFound,
                libc::EACCES | libc::EPERM | libc::EROFS | libc::EISDIR => FsError::AccessDenied,
                libc::EEXIST => FsError::FileExists,
                libc::ENOSPC | libc::EDQUOT | libc::EFBIG => FsError::DiskFull,
                libc::ENAMETOOLONG | libc::EINVAL | libc::EILSEQ => FsError::InvalidName,
                libc::EAGAIN | libc::EDEADLK => FsError::AccessDenied,
                libc::ENOSYS | libc::EOPNOTSUPP => FsError::NotImplemented,
                _ => FsError::Error,
            };
        }

        match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound,
            io::ErrorKind::PermissionDenied => FsError::AccessDenied,
            io::ErrorKind::AlreadyExists => FsError::FileExists,
            io::ErrorKind::InvalidInput => FsError::InvalidName,
            io::ErrorKind::WriteZero => FsError::DiskFull,
            io::ErrorKind::Unsupported => FsError::NotImplemented,
            _ => FsError::Error,
        }
    }

    /// Like [`FsError::from_io`], but tells a missing entry apart from a
    /// missing containing directory by probing the target's parent.
    pub fn from_io_at(e: &io::Error, target: &Path) -> Self {
        match Self::from_io(e) {
            FsError::NotFound => match target.parent() {
                Some(parent) if !parent.is_dir() => FsError::PathNotFound,
                _ => FsError::NotFound,
            },
            other => other,
        }
    }
}
