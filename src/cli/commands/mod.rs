
use crate::config::credentials::{CREDENTIAL_ENV_VARS, get_credential_value};
use crate::config::{Config, load_config};
use crate::gateway;
use crate::pipeline::WebhookPipeline;
use crate::signature::{SIGNATURE_HEADER, sign_body};
use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "linehook")]
#[command(about = "LINE webhook bot gateway")]
#[command(version = crate::VERSION)]
pub struct Cli {
    /// Config file (default: $LINEHOOK_HOME/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the webhook, push and health endpoints
    Gateway {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the X-Line-Signature for a request body
    #[command(group(ArgGroup::new("input").required(true).args(["body", "file"])))]
    Sign {
        /// Body given inline
        #[arg(long)]
        body: Option<String>,
        /// Read the body from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Validate the config and print it with secrets redacted
    Check,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Gateway { host, port } => {
            gateway_command(config_path, host, port).await?;
        }
        Commands::Sign { body, file } => {
            let config = load_config(config_path)?;
            let body = read_body(body, file.as_deref())?;
            println!("{}", signature_for(&config, &body)?);
        }
        Commands::Check => {
            let config = load_config(config_path)?;
            println!("{}", check_report(&config));
        }
    }

    Ok(())
}

async fn gateway_command(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, host, port);
    config
        .validate_for_serving()
        .with_context(|| "Configuration is not ready to serve")?;

    let pipeline = Arc::new(WebhookPipeline::from_config(&config));
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("gateway: shutting down");
        }
    };
    let handle = gateway::start(&config, pipeline, shutdown).await?;
    handle.await.context("gateway task failed")?;
    Ok(())
}

fn apply_overrides(config: &mut Config, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
}

fn read_body(body: Option<String>, file: Option<&Path>) -> Result<Vec<u8>> {
    match (body, file) {
        (Some(body), _) => Ok(body.into_bytes()),
        (None, Some(path)) => std::fs::read(path)
            .with_context(|| format!("Failed to read body from {}", path.display())),
        (None, None) => bail!("either --body or --file is required"),
    }
}

fn signature_for(config: &Config, body: &[u8]) -> Result<String> {
    if config.line.channel_secret.is_empty() {
        bail!("line.channelSecret is not set (config file or LINEHOOK_CHANNEL_SECRET)");
    }
    Ok(sign_body(&config.line.channel_secret, body)?)
}

fn check_report(config: &Config) -> String {
    let readiness = match config.validate_for_serving() {
        Ok(()) => "ready to serve".to_string(),
        Err(e) => format!("not ready to serve: {}", e),
    };
    format!(
        "config ok, {}\nwebhook: POST {} ({} header)\npush endpoint: {}\ncredentials:\n{}\n{:#?}",
        readiness,
        config.gateway.webhook_path,
        SIGNATURE_HEADER,
        if config.gateway.push_token.is_empty() {
            "disabled"
        } else {
            "enabled"
        },
        credential_status(config),
        config
    )
}

/// One line per credential slot: whether it is set, and the env var that overrides it.
fn credential_status(config: &Config) -> String {
    CREDENTIAL_ENV_VARS
        .iter()
        .map(|(name, env)| {
            let state = match get_credential_value(config, name) {
                Some(value) if !value.is_empty() => "set",
                _ => "missing",
            };
            format!("  {name}: {state} (override with {env})")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
