use std::path::PathBuf;

use unionmount::config::{
    merge_layer_overrides, parse_config, render_config, validate_config, LayersConfig,
};
use unionmount::{Config, UnionMountError};

#[test]
fn test_empty_config_uses_defaults() {
    let config = parse_config("").unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.get_fuse_ttl_secs(), 1);
    assert_eq!(config.volume.get_label(), "OverlayFS");
    assert_eq!(config.volume.get_filesystem_name(), "NTFS");
    assert_eq!(config.volume.get_max_component_length(), 255);
}

#[test]
fn test_full_config_parses() {
    let config = parse_config(
        r#"
fuse_ttl_secs = 5

[layers]
base_root = "/srv/base"
overlay_root = "/srv/overlay"
mount_point = "/mnt/union"

[volume]
label = "Scratch"
max_component_length = 128
"#,
    )
    .unwrap();

    assert_eq!(config.get_fuse_ttl_secs(), 5);
    let layers = config.resolved_layers().unwrap();
    assert_eq!(layers.base_root, PathBuf::from("/srv/base"));
    assert_eq!(layers.overlay_root, PathBuf::from("/srv/overlay"));
    assert_eq!(layers.mount_point, PathBuf::from("/mnt/union"));

    let volume = config.volume.to_volume_info();
    assert_eq!(volume.label, "Scratch");
    assert_eq!(volume.max_component_length, 128);
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    let err = parse_config("[layers\nbase_root = 1").unwrap_err();
    assert!(matches!(err, UnionMountError::Config(_)));
}

#[test]
fn test_missing_layer_names_the_flag() {
    let config = parse_config("[layers]\nbase_root = \"/srv/base\"\n").unwrap();

    let err = config.resolved_layers().unwrap_err();
    assert!(err.to_string().contains("--overlay"), "got: {}", err);
}

#[test]
fn test_command_line_overrides_file() {
    let file = parse_config(
        "[layers]\nbase_root = \"/file/base\"\noverlay_root = \"/file/overlay\"\n",
    )
    .unwrap();

    let merged = merge_layer_overrides(
        file,
        LayersConfig {
            base_root: Some("/cli/base".to_string()),
            overlay_root: None,
            mount_point: Some("/cli/mnt".to_string()),
        },
    );

    let layers = merged.resolved_layers().unwrap();
    assert_eq!(layers.base_root, PathBuf::from("/cli/base"));
    assert_eq!(layers.overlay_root, PathBuf::from("/file/overlay"));
    assert_eq!(layers.mount_point, PathBuf::from("/cli/mnt"));
}

#[test]
fn test_zero_component_length_rejected() {
    let config = parse_config("[volume]\nmax_component_length = 0\n").unwrap();
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_rendered_config_parses_back() {
    let config = parse_config("fuse_ttl_secs = 3\n[volume]\nlabel = \"X\"\n").unwrap();
    let rendered = render_config(&config).unwrap();
    assert_eq!(parse_config(&rendered).unwrap(), config);
}
