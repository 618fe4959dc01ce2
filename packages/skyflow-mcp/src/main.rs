// Stdio MCP server exposing the Skyflow deidentify/reidentify tools

mod server;

use anyhow::{Context, Result};
use clap::Parser;
use skyflow_client::{register_tools, SkyflowClient, ToolOptions, ToolRegistry};
use tokio::io::{stdin, stdout, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::server::McpServer;

#[derive(Parser, Debug)]
#[command(
    name = "skyflow-mcp",
    version,
    about = "Skyflow deidentify/reidentify tools over MCP stdio"
)]
struct Args {
    /// Prefix prepended to each tool name
    #[arg(long, default_value = "skyflow_")]
    prefix: String,

    /// Register tools without a name prefix
    #[arg(long, conflicts_with = "prefix")]
    no_prefix: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,skyflow_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = SkyflowClient::from_env().context("Failed to configure Skyflow client")?;
    tracing::info!(
        vault_id = %client.vault_id(),
        cluster_id = %client.cluster_id(),
        "Skyflow client configured"
    );

    let options = if args.no_prefix {
        ToolOptions::default()
    } else {
        ToolOptions::with_prefix(args.prefix)
    };

    let mut registry = ToolRegistry::new();
    register_tools(&mut registry, &client, &options);

    McpServer::new(registry)
        .serve(BufReader::new(stdin()), stdout())
        .await
        .context("MCP server error")?;

    Ok(())
}
