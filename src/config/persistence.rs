use crate::error::{Result, UnionMountError};
use std::io::{IsTerminal, Write};
use std::path::Path;

use crate::config::paths::*;
use crate::config::schema::*;

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    let config_path = config_dir.join("config.toml");

    let config = if !config_path.exists() {
        let is_explicit_config_dir = std::env::var("UNIONMOUNT_CONFIG_DIR").is_ok();
        let is_non_interactive = !std::io::stdin().is_terminal();

        let should_create = if is_explicit_config_dir || is_non_interactive {
            true
        } else {
            println!("No config file found at {}", config_path.display());

            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();

            loop {
                print!("Create default config? [y/N]: ");
                stdout.flush().map_err(|e| {
                    UnionMountError::Config(format!("Failed to flush stdout: {}", e))
                })?;

                let mut input = String::new();
                stdin
                    .read_line(&mut input)
                    .map_err(|e| UnionMountError::Config(format!("Failed to read input: {}", e)))?;
                let choice = input.trim().to_lowercase();

                match choice.as_str() {
                    "" | "n" | "no" => break false,
                    "y" | "yes" => break true,
                    _ => eprintln!("Please enter 'y' or 'n'."),
                }
            }
        };

        if should_create {
            write_config(&config_path, &Config::default())?;
            eprintln!("Created default config at {}", config_path.display());
        }

        Config::default()
    } else {
        let toml_content = std::fs::read_to_string(&config_path)
            .map_err(|e| UnionMountError::Config(format!("Failed to read config file: {}", e)))?;
        parse_config(&toml_content)?
    };

    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(toml_content: &str) -> Result<Config> {
    toml::from_str(toml_content)
        .map_err(|e| UnionMountError::Config(format!("Failed to parse config: {}", e)))
}

/// Layer settings given on the command line take precedence over the file.
pub fn merge_layer_overrides(base: Config, overrides: LayersConfig) -> Config {
    Config {
        layers: LayersConfig {
            base_root: overrides.base_root.or(base.layers.base_root),
            overlay_root: overrides.overlay_root.or(base.layers.overlay_root),
            mount_point: overrides.mount_point.or(base.layers.mount_point),
        },
        ..base
    }
}

pub fn render_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config)
        .map_err(|e| UnionMountError::Config(format!("Failed to serialize config: {}", e)))
}

fn write_config(config_path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            UnionMountError::Config(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    std::fs::write(config_path, render_config(config)?)
        .map_err(|e| UnionMountError::Config(format!("Failed to write config file: {}", e)))
}
