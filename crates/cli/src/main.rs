mod cli;

use anyhow::{Context, Result};
use ariel::{init_logging, ArielConfig, RemoteFunction};
use clap::Parser;
use cli::{Cli, Command, Connection};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.connection)?;
    init_logging(&config)?;
    debug!("Using {} endpoint {:?}", config.protocol, config.endpoint);

    match cli.command {
        Command::Inspect { model, version } => inspect(model, version, config).await,
        Command::Ready => ready(config).await,
    }
}

fn load_config(connection: &Connection) -> Result<ArielConfig> {
    let mut config = ArielConfig::load(connection.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(protocol) = connection.protocol {
        config = config.with_protocol(protocol);
    }
    if let Some(endpoint) = &connection.endpoint {
        config = config.with_endpoint(endpoint.clone());
    }
    Ok(config)
}

async fn inspect(model: String, version: Option<String>, config: ArielConfig) -> Result<()> {
    let mut builder = RemoteFunction::builder(model.as_str()).config(config);
    if let Some(version) = version {
        builder = builder.version(version);
    }

    let function = builder
        .build()
        .await
        .with_context(|| format!("failed to resolve model {}", model))?;
    println!("{}", function);
    Ok(())
}

async fn ready(config: ArielConfig) -> Result<()> {
    let backend = transport::connect(&config.transport_config())?;
    let ready = backend
        .is_ready()
        .await
        .with_context(|| format!("failed to reach {}", backend.endpoint()))?;

    println!("{}: {}", backend.endpoint(), if ready { "ready" } else { "not ready" });
    if !ready {
        std::process::exit(1);
    }
    Ok(())
}
