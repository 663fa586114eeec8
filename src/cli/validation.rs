use std::path::{Component, Path, PathBuf};

use crate::config::ResolvedLayers;
use crate::error::{Result, UnionMountError};

/// Lexically normalize `path` against the current directory so layouts can
/// be compared before any of the directories exist.
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Reject layouts the union cannot serve: the mount point must not sit on
/// or inside either layer, and the two layers must be distinct.
pub fn validate_layer_layout(layers: &ResolvedLayers) -> Result<()> {
    let base = absolute(&layers.base_root);
    let overlay = absolute(&layers.overlay_root);
    let mount = absolute(&layers.mount_point);

    if base == overlay {
        return Err(UnionMountError::Config(format!(
            "Base and overlay layers must be different directories (both are {})",
            base.display()
        )));
    }

    for (name, root) in [("base", &base), ("overlay", &overlay)] {
        if mount.starts_with(root) {
            return Err(UnionMountError::Config(format!(
                "Mount point {} must not be inside the {} layer {}",
                mount.display(),
                name,
                root.display()
            )));
        }
        if root.starts_with(&mount) {
            return Err(UnionMountError::Config(format!(
                "The {} layer {} must not be inside the mount point {}",
                name,
                root.display(),
                mount.display()
            )));
        }
    }

    Ok(())
}
