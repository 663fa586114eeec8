use crate::cli::ConfigAction;
use crate::config::{get_config_path, load_config, render_config};
use crate::error::Result;

pub fn handle_config_command(action: Option<ConfigAction>) -> Result<()> {
    match action {
        Some(ConfigAction::Path) => {
            let config_path = get_config_path()?;
            println!("Config location: {}", config_path.display());
        }
        None | Some(ConfigAction::Show) => {
            let config_path = get_config_path()?;
            let config = load_config()?;
            println!("Config file: {}", config_path.display());
            println!();
            println!("Current configuration:");
            println!("  Layers:");
            println!(
                "    base_root: {}",
                config.layers.base_root.as_deref().unwrap_or("(not set)")
            );
            println!(
                "    overlay_root: {}",
                config.layers.overlay_root.as_deref().unwrap_or("(not set)")
            );
            println!(
                "    mount_point: {}",
                config.layers.mount_point.as_deref().unwrap_or("(not set)")
            );
            println!("  Volume:");
            println!("    label: {}", config.volume.get_label());
            println!(
                "    filesystem_name: {}",
                config.volume.get_filesystem_name()
            );
            println!(
                "    max_component_length: {}",
                config.volume.get_max_component_length()
            );
            println!("  Other:");
            println!("    fuse_ttl_secs: {}", config.get_fuse_ttl_secs());

            let rendered = render_config(&config)?;
            if !rendered.trim().is_empty() {
                println!();
                println!("As TOML:");
                print!("{}", rendered);
            }
        }
    }
    Ok(())
}
