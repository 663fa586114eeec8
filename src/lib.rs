pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fuse;
pub mod overlay;

pub use config::expand_tilde;
pub use config::get_config_path;
pub use config::load_config;
pub use config::Config;
pub use config::ResolvedLayers;

pub use error::{Result, UnionMountError};

pub use overlay::{FileSystemOperations, FsError, FsResult, OverlayFs, PathResolver};
