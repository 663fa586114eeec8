use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "unionmount")]
#[command(
    about = "Mount a writable overlay directory over a read-mostly base directory as one merged tree"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Mount the union and serve it until interrupted")]
    Mount {
        #[arg(long, value_name = "DIR", help = "Base layer directory (must exist)")]
        base: Option<PathBuf>,

        #[arg(
            long,
            value_name = "DIR",
            help = "Overlay layer directory (created if missing)"
        )]
        overlay: Option<PathBuf>,

        #[arg(long = "mount", value_name = "DIR", help = "Mount point")]
        mount_point: Option<PathBuf>,
    },
    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    #[command(about = "Show current configuration values")]
    Show,
    #[command(about = "Show config file path")]
    Path,
}
