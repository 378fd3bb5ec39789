use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use spotx_common::security::{generate_token, hash_token};
use spotx_server::config::ServerConfig;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "spotx-server")]
#[command(about = "SpotX rewarded advertising backend")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides server.port from the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Print a fresh admin token and its hash, then exit
    #[arg(long)]
    generate_admin_token: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_admin_token {
        let token = generate_token();
        println!("token: {}", token);
        println!("admin_token_hash = \"{}\"", hash_token(&token));
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => ServerConfig::load_from_path(path)?,
        None => ServerConfig::load()?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    config.validate()?;

    info!("Starting SpotX server");
    info!("API will bind to {}:{}", config.server.bind_address, config.server.port);

    if let Err(e) = spotx_server::server::run(config).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("SpotX server stopped");
    Ok(())
}
