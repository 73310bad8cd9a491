use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use waypoint::error::ConfigError;
use waypoint::filter::{MatchMode, load_patterns_file};
use waypoint::proxy::{self, ProxyConfig};
use waypoint::whitelist::CommandWhitelister;

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "DNS relay that whitelists resolved addresses of matching domains", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value = "5353")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Upstream DNS server (host:port)
    #[arg(short, long, default_value = "8.8.8.8:53")]
    upstream: String,

    /// Domain pattern (case-insensitive regex); may be repeated
    #[arg(short = 'e', long = "pattern", value_name = "REGEX")]
    patterns: Vec<String>,

    /// File with one pattern per line
    #[arg(long, value_name = "FILE")]
    patterns_file: Option<PathBuf>,

    /// Where a pattern may start matching within a name
    #[arg(long, value_enum, default_value_t = MatchMode::Prefix)]
    match_mode: MatchMode,

    /// Keep whitelisted addresses on exit
    #[arg(short, long)]
    keep: bool,

    /// Seconds to wait for an upstream reply
    #[arg(short, long, default_value = "5")]
    timeout: u64,

    /// Whitelist program to run for every batch of new addresses
    #[arg(long, default_value = "whitelist", value_name = "PROGRAM")]
    whitelist_cmd: String,

    /// Extra argument passed to every whitelist invocation; may be repeated
    #[arg(long = "whitelist-arg", value_name = "ARG", allow_hyphen_values = true)]
    whitelist_args: Vec<String>,

    /// Log every exchange
    #[arg(short, long)]
    verbose: bool,
}

fn resolve_upstream(upstream: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAddress {
        value: upstream.to_string(),
        reason,
    };

    upstream
        .to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no addresses found".to_string()))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut patterns = args.patterns;
    if let Some(path) = &args.patterns_file {
        patterns.extend(load_patterns_file(path)?);
    }
    if patterns.is_empty() {
        tracing::warn!("no patterns configured, nothing will be whitelisted");
    }

    let config = ProxyConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        upstream: resolve_upstream(&args.upstream)?,
        patterns,
        match_mode: args.match_mode,
        keep: args.keep,
        upstream_timeout: Duration::from_secs(args.timeout),
    };
    let whitelister = Arc::new(CommandWhitelister::new(args.whitelist_cmd, args.whitelist_args));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    rt.block_on(proxy::run(config, whitelister))?;

    Ok(())
}
