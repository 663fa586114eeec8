pub mod paths;
pub mod persistence;
pub mod schema;

pub use paths::*;
pub use persistence::*;
pub use schema::*;

fn default_volume_label() -> String {
    "OverlayFS".to_string()
}

fn default_filesystem_name() -> String {
    "NTFS".to_string()
}

fn default_max_component_length() -> u32 {
    255
}

fn default_fuse_ttl_secs() -> u64 {
    1
}
