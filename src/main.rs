use clap::Parser;

use unionmount::cli::{Args, Commands};
use unionmount::commands;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => {
            std::process::exit(code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> unionmount::Result<i32> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("UNIONMOUNT_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Mount {
            base,
            overlay,
            mount_point,
        } => commands::run_mount(base, overlay, mount_point).await,
        Commands::Config { action } => {
            commands::handle_config_command(action)?;
            Ok(0)
        }
    }
}
