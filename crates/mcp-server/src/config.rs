//! Process configuration: CLI flags, `SPILLWAY_*` environment fallbacks,
//! and the immutable [`GateConfig`] value threaded through the proxy.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::limits;

pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Parser)]
#[command(
    name = "spillway-mcp",
    version,
    about = "MCP proxy that parks oversized tool responses in a queryable, TTL-bounded cache"
)]
pub struct CliArgs {
    /// Token budget for the size gate; a response may occupy at most
    /// 4 bytes per token, capped at 900 kB.
    #[arg(long, env = "SPILLWAY_MAX_TOKENS", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_tokens: Option<u64>,

    /// Chunk size, in characters, for sequential reads of parked responses.
    #[arg(long, env = "SPILLWAY_CHUNK_SIZE", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,

    /// Parked responses expire this many seconds after being cached.
    #[arg(long, env = "SPILLWAY_TTL_SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub ttl_secs: Option<u64>,

    /// Directory holding parked responses.
    #[arg(long, env = "SPILLWAY_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Mirror the wrapped server's stderr into the proxy log.
    #[arg(long, env = "SPILLWAY_DEBUG")]
    pub debug: bool,

    /// The wrapped MCP server command line, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Immutable proxy configuration.
///
/// Never held as ambient global state: the server keeps the current value
/// behind an `Arc` and swaps in a whole new one when the client identity
/// becomes known at `initialize`.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub max_tokens: u64,
    pub chunk_size: usize,
    pub ttl: Duration,
    pub cache_dir: PathBuf,
    pub debug: bool,
    /// Client name announced at `initialize`; recorded on cached payloads.
    pub client_label: String,
    max_tokens_is_default: bool,
}

impl GateConfig {
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            max_tokens: args.max_tokens.unwrap_or(limits::DEFAULT_MAX_TOKENS),
            max_tokens_is_default: args.max_tokens.is_none(),
            chunk_size: args
                .chunk_size
                .map(|size| size as usize)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            ttl: args.ttl_secs.map(Duration::from_secs).unwrap_or(DEFAULT_TTL),
            cache_dir: args.cache_dir.clone().unwrap_or_else(default_cache_dir),
            debug: args.debug,
            client_label: "unknown".to_string(),
        }
    }

    /// New configuration for a detected client identity. An explicit
    /// `--max-tokens` (or env override) always wins over the preset table.
    pub fn for_client(&self, client_name: &str) -> Self {
        let mut config = self.clone();
        let label = client_name.trim();
        if !label.is_empty() {
            config.client_label = label.to_string();
        }
        if config.max_tokens_is_default {
            if let Some(limit) = limits::token_limit_for_client(client_name) {
                config.max_tokens = limit;
            }
        }
        config
    }

    /// Byte budget a directly returned response must fit in.
    pub fn max_response_bytes(&self) -> usize {
        limits::response_budget_bytes(self.max_tokens)
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".spillway").join("cache"))
        .unwrap_or_else(|| std::env::temp_dir().join("spillway-cache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).expect("parse args")
    }

    #[test]
    fn defaults_apply_when_no_flags_are_given() {
        let args = parse(&["spillway-mcp", "--", "server"]);
        let config = GateConfig::from_args(&args);
        assert_eq!(config.max_tokens, limits::DEFAULT_MAX_TOKENS);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.client_label, "unknown");
        assert!(!config.debug);
    }

    #[test]
    fn flags_override_defaults_and_capture_the_command() {
        let args = parse(&[
            "spillway-mcp",
            "--max-tokens",
            "500",
            "--chunk-size",
            "128",
            "--ttl-secs",
            "60",
            "--debug",
            "--",
            "npx",
            "some-server",
            "--flag",
        ]);
        let config = GateConfig::from_args(&args);
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.max_response_bytes(), 2_000);
        assert_eq!(config.chunk_size, 128);
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert!(config.debug);
        assert_eq!(args.command, vec!["npx", "some-server", "--flag"]);
    }

    #[test]
    fn wrapped_command_is_mandatory() {
        assert!(CliArgs::try_parse_from(["spillway-mcp"]).is_err());
    }

    #[test]
    fn client_presets_apply_only_without_an_explicit_limit() {
        let args = parse(&["spillway-mcp", "--", "server"]);
        let config = GateConfig::from_args(&args).for_client("cursor");
        assert_eq!(config.max_tokens, 30_000);
        assert_eq!(config.client_label, "cursor");

        let args = parse(&["spillway-mcp", "--max-tokens", "77", "--", "server"]);
        let config = GateConfig::from_args(&args).for_client("cursor");
        assert_eq!(config.max_tokens, 77);
    }

    #[test]
    fn blank_client_names_keep_the_unknown_label() {
        let args = parse(&["spillway-mcp", "--", "server"]);
        let config = GateConfig::from_args(&args).for_client("  ");
        assert_eq!(config.client_label, "unknown");
    }
}
