use crate::config::{Config, ResolvedLayers};
use crate::error::Result;
use crate::overlay::{OverlayFs, PathResolver};

/// Build the union for `layers`: the base must exist, the overlay root is
/// created when missing, volume identity comes from `config`.
pub fn build_overlay_fs(layers: &ResolvedLayers, config: &Config) -> Result<OverlayFs> {
    let resolver = PathResolver::establish(layers.overlay_root.clone(), layers.base_root.clone())?;

    tracing::debug!(
        "Union layers established: overlay={}, base={}",
        layers.overlay_root.display(),
        layers.base_root.display()
    );

    Ok(OverlayFs::new(resolver, config.volume.to_volume_info()))
}
