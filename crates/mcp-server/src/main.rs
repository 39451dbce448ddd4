//! Spillway MCP proxy binary.
//!
//! Wraps an arbitrary MCP server subprocess and parks oversized tool
//! responses in a queryable, TTL-bounded cache:
//!
//! ```text
//! spillway-mcp [--max-tokens N] [--chunk-size N] [--ttl-secs N] \
//!              [--cache-dir DIR] [--debug] -- <command> [args...]
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::transport::stdio;
use rmcp::ServiceExt;

use spillway_mcp::config::{CliArgs, GateConfig};
use spillway_mcp::proxy::{perform_handshake, SpillwayServer};
use spillway_mcp::sweep::start_sweep;
use spillway_mcp::transport::RpcClient;
use spillway_store::ResponseStore;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Logging must stay on stderr: stdout carries the MCP protocol.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = GateConfig::from_args(&args);
    let (program, program_args) = args
        .command
        .split_first()
        .context("missing wrapped server command (pass it after `--`)")?;

    log::info!("spawning wrapped server: {}", args.command.join(" "));
    let transport = Arc::new(RpcClient::spawn(program, program_args, config.debug).await?);

    let remote = perform_handshake(&transport)
        .await
        .context("initialize handshake with the wrapped server failed")?;
    log::info!("wrapped server ready: {} {}", remote.name, remote.version);

    let store = Arc::new(
        ResponseStore::open(&config.cache_dir, config.ttl, config.chunk_size)
            .await
            .with_context(|| {
                format!("failed to open cache directory {}", config.cache_dir.display())
            })?,
    );
    let sweep = start_sweep(store.clone());

    let server = SpillwayServer::new(config, transport.clone(), store, remote);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    sweep.stop();
    transport.shutdown();
    log::info!("spillway-mcp stopped");
    Ok(())
}
