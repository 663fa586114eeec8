use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UnionMountError>;

#[derive(Error, Debug)]
pub enum UnionMountError {
    #[error("Base layer does not exist: {0}")]
    MissingBaseRoot(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("FUSE error: {0}")]
    Fuse(String),
}

impl From<std::io::Error> for UnionMountError {
    fn from(err: std::io::Error) -> Self {
        UnionMountError::Io(err)
    }
}
