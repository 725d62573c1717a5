//! Voice chat client
//!
//! Captures audio, streams it to the relay, plays back whatever the
//! relay forwards. Ctrl+C performs a best-effort BYE before exiting.

use anyhow::Result;
use std::path::PathBuf;
use std::process::exit;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_relay::client;
use voice_relay::config::ClientConfig;

const USAGE: &str = "\
usage: client [OPTIONS] <host[:port]>

options:
  --rate <hz>        sample rate: 8000, 12000, 16000, 24000, 48000 (default 48000)
  --channels <n>     1 or 2 (default 2)
  --frame-ms <ms>    2.5, 5, 10, 20, 40, 60 (default 10)
  --stdio            pipe PCM through stdin/stdout instead of a live device
  --config <path>    load settings from a TOML file first
  -h, --help         show this help
";

fn parse_args() -> Result<ClientConfig> {
    let mut config_path: Option<PathBuf> = None;
    let mut rate: Option<u32> = None;
    let mut channels: Option<u16> = None;
    let mut frame_ms: Option<f32> = None;
    let mut stdio = false;
    let mut server: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| anyhow::anyhow!("{} needs a value", name))
        };
        match arg.as_str() {
            "--rate" => rate = Some(value("--rate")?.parse()?),
            "--channels" => channels = Some(value("--channels")?.parse()?),
            "--frame-ms" => frame_ms = Some(value("--frame-ms")?.parse()?),
            "--stdio" => stdio = true,
            "--config" => config_path = Some(PathBuf::from(value("--config")?)),
            "-h" | "--help" => {
                print!("{}", USAGE);
                exit(0);
            }
            other if other.starts_with('-') => {
                anyhow::bail!("unknown option: {}", other);
            }
            positional => {
                if server.replace(positional.to_string()).is_some() {
                    anyhow::bail!("more than one destination given");
                }
            }
        }
    }

    let mut config = match config_path {
        Some(path) => ClientConfig::load(&path)?,
        None => ClientConfig::default(),
    };
    if let Some(rate) = rate {
        config.audio.sample_rate = rate;
    }
    if let Some(channels) = channels {
        config.audio.channels = channels;
    }
    if let Some(frame_ms) = frame_ms {
        config.audio.frame_ms = frame_ms;
    }
    if stdio {
        config.stdio = true;
    }
    if server.is_some() {
        config.server = server;
    }
    if config.server.is_none() {
        anyhow::bail!("no destination given");
    }
    config.audio.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            eprint!("{}", USAGE);
            exit(2);
        }
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    client::run(config, shutdown_rx).await?;
    tracing::info!("exiting");
    Ok(())
}
