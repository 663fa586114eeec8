use crate::error::{Result, UnionMountError};
use crate::overlay::volume::VolumeInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::paths::expand_tilde;

/// Upper bound for `fuse_ttl_secs`; longer caches hide base-layer changes.
const MAX_FUSE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LayersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VolumeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_component_length: Option<u32>,
}

impl VolumeConfig {
    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or_else(super::default_volume_label)
    }

    pub fn get_filesystem_name(&self) -> String {
        self.filesystem_name
            .clone()
            .unwrap_or_else(super::default_filesystem_name)
    }

    pub fn get_max_component_length(&self) -> u32 {
        self.max_component_length
            .unwrap_or_else(super::default_max_component_length)
    }

    pub fn to_volume_info(&self) -> VolumeInfo {
        VolumeInfo {
            label: self.get_label(),
            filesystem_name: self.get_filesystem_name(),
            max_component_length: self.get_max_component_length(),
            ..VolumeInfo::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuse_ttl_secs: Option<u64>,
    #[serde(default)]
    pub layers: LayersConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
}

impl Config {
    pub fn get_fuse_ttl_secs(&self) -> u64 {
        self.fuse_ttl_secs
            .unwrap_or_else(super::default_fuse_ttl_secs)
    }

    /// Physical locations of the two layers and the mount point. Every one
    /// of them must be configured by now.
    pub fn resolved_layers(&self) -> Result<ResolvedLayers> {
        fn required(value: &Option<String>, key: &str, flag: &str) -> Result<PathBuf> {
            value.as_deref().map(expand_tilde).ok_or_else(|| {
                UnionMountError::Config(format!(
                    "No {} configured: pass {} or set [layers] {} in the config file",
                    key, flag, key
                ))
            })
        }

        Ok(ResolvedLayers {
            base_root: required(&self.layers.base_root, "base_root", "--base")?,
            overlay_root: required(&self.layers.overlay_root, "overlay_root", "--overlay")?,
            mount_point: required(&self.layers.mount_point, "mount_point", "--mount")?,
        })
    }
}

/// Layer roots and mount point after merging flags, file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayers {
    pub base_root: PathBuf,
    pub overlay_root: PathBuf,
    pub mount_point: PathBuf,
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.volume.get_max_component_length() == 0 {
        return Err(UnionMountError::Config(
            "max_component_length must be greater than zero".to_string(),
        ));
    }

    let ttl = config.get_fuse_ttl_secs();
    if ttl > MAX_FUSE_TTL_SECS {
        eprintln!(
            "Warning: fuse_ttl_secs ({}) is above recommended maximum of {}s. \
             Changes made directly to the base layer may stay invisible for a long time.",
            ttl, MAX_FUSE_TTL_SECS
        );
    }

    Ok(())
}
