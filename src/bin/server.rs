//! Relay server
//!
//! Binds one UDP socket and fans voice datagrams out among connected
//! peers. Runs until killed; holds no persistent state.

use anyhow::Result;
use std::path::PathBuf;
use std::process::exit;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_relay::config::ServerConfig;
use voice_relay::network::{bind_udp, RelayServer};

const USAGE: &str = "\
usage: server [--config <path>] [port]
";

fn parse_args() -> Result<ServerConfig> {
    let mut config_path: Option<PathBuf> = None;
    let mut port: Option<u16> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a value"))?;
                config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                print!("{}", USAGE);
                exit(0);
            }
            other if other.starts_with('-') => anyhow::bail!("unknown option: {}", other),
            positional => {
                if port.replace(positional.parse()?).is_some() {
                    anyhow::bail!("more than one port given");
                }
            }
        }
    }

    let mut config = match config_path {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = port {
        config.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            eprint!("{}", USAGE);
            exit(2);
        }
    };

    let socket = bind_udp(([0, 0, 0, 0], config.port).into())?;
    tracing::info!("starting server on port {}", config.port);

    tokio::select! {
        result = RelayServer::new().run(socket) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, exiting"),
    }
    Ok(())
}
