use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::validate_layer_layout;
use crate::config::{load_config, merge_layer_overrides, LayersConfig};
use crate::error::Result;
use crate::overlay::{build_overlay_fs, mount_union};

fn path_override(path: Option<PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

/// Mount the union described by the flags and config file, then serve it
/// until Ctrl+C.
pub async fn run_mount(
    base: Option<PathBuf>,
    overlay: Option<PathBuf>,
    mount_point: Option<PathBuf>,
) -> Result<i32> {
    let config = merge_layer_overrides(
        load_config()?,
        LayersConfig {
            base_root: path_override(base),
            overlay_root: path_override(overlay),
            mount_point: path_override(mount_point),
        },
    );

    let layers = config.resolved_layers()?;
    validate_layer_layout(&layers)?;

    let fs = Arc::new(build_overlay_fs(&layers, &config)?);
    let session = mount_union(fs, &layers.mount_point, config.get_fuse_ttl_secs())?;

    println!(
        "Mounted {} over {} at {}",
        layers.overlay_root.display(),
        layers.base_root.display(),
        session.mount_point().display()
    );
    println!("[press Ctrl+C to unmount]");

    let interrupted = tokio::signal::ctrl_c().await;
    session.unmount();
    interrupted?;

    println!("Unmounted {}", layers.mount_point.display());
    Ok(0)
}
