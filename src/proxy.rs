//! Relay orchestration.
//!
//! Binds the transport, runs it until shutdown, then undoes the whitelist
//! unless told to keep it.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tracing::{error, info};

use crate::error::ProxyError;
use crate::filter::{MatchMode, Patterns};
use crate::resolver::Resolver;
use crate::stats::Stats;
use crate::transport::RelayContext;
use crate::transport::udp::UdpTransport;
use crate::whitelist::{Dispatcher, WhitelistState, Whitelister, apply_logged};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the relay.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Local address to bind (e.g., 127.0.0.1:5353)
    pub bind_addr: SocketAddr,
    /// Upstream DNS server address
    pub upstream: SocketAddr,
    /// Domain patterns whose addresses get whitelisted
    pub patterns: Vec<String>,
    pub match_mode: MatchMode,
    /// Leave whitelisted addresses in place on exit
    pub keep: bool,
    /// How long to wait for each upstream reply
    pub upstream_timeout: Duration,
}

/// A bound relay, ready to run.
pub struct Proxy {
    transport: UdpTransport,
    resolver: Arc<Resolver>,
    whitelister: Arc<dyn Whitelister>,
    stats: Arc<Stats>,
    upstream: SocketAddr,
    upstream_timeout: Duration,
    keep: bool,
}

impl Proxy {
    /// Compile the patterns and bind the listening socket.
    pub async fn bind(
        config: ProxyConfig,
        whitelister: Arc<dyn Whitelister>,
    ) -> Result<Self, ProxyError> {
        let patterns = Patterns::new(&config.patterns, config.match_mode)?;
        let resolver = Arc::new(Resolver::new(patterns, Arc::new(WhitelistState::new())));

        let transport = UdpTransport::bind(config.bind_addr)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self {
            transport,
            resolver,
            whitelister,
            stats: Arc::new(Stats::new()),
            upstream: config.upstream,
            upstream_timeout: config.upstream_timeout,
            keep: config.keep,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Addresses whitelisted so far.
    pub fn state(&self) -> Arc<WhitelistState> {
        self.resolver.state().clone()
    }

    /// Relay queries until `shutdown` resolves, then clean up.
    ///
    /// Cleanup waits for in-flight exchanges and queued whitelist requests,
    /// then removes every whitelisted address unless `keep` was set.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        match self.transport.local_addr() {
            Ok(addr) => info!(
                upstream = %self.upstream,
                patterns = self.resolver.patterns().len(),
                mode = ?self.resolver.patterns().mode(),
                "DNS relay listening on {}",
                addr
            ),
            Err(e) => error!("failed to read local address: {}", e),
        }

        let dispatcher = Dispatcher::spawn(self.whitelister.clone());
        let ctx = RelayContext {
            upstream: self.upstream,
            timeout: self.upstream_timeout,
            resolver: self.resolver.clone(),
            submitter: dispatcher.submitter(),
            stats: self.stats.clone(),
        };

        let reporter = tokio::spawn(report_stats(self.stats.clone(), self.resolver.clone()));

        self.transport.run(ctx, shutdown).await;

        reporter.abort();
        dispatcher.shutdown().await;

        let removals = self.resolver.shutdown_requests(self.keep);
        if self.keep {
            info!(
                addresses = self.resolver.state().len(),
                "keeping whitelisted addresses"
            );
        } else {
            info!(addresses = removals.len(), "removing whitelisted addresses");
        }

        let whitelister = self.whitelister.as_ref();
        stream::iter(&removals)
            .for_each(|request| apply_logged(whitelister, request))
            .await;

        info!("DNS relay stopped");
    }
}

/// Bind and run the relay until Ctrl-C or SIGTERM.
pub async fn run(config: ProxyConfig, whitelister: Arc<dyn Whitelister>) -> Result<(), ProxyError> {
    let proxy = Proxy::bind(config, whitelister).await?;
    proxy.run_until(shutdown_signal()).await;

    Ok(())
}

/// Resolves on the first termination signal.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

async fn report_stats(stats: Arc<Stats>, resolver: Arc<Resolver>) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.tick().await; // Skip first immediate tick
    loop {
        interval.tick().await;
        let snapshot = stats.snapshot_and_reset();
        info!(
            "[stats] requests={} forwarded={} malformed={} upstream_failed={} whitelisted={} tracked={} avg_response={:.2}ms",
            snapshot.requests,
            snapshot.forwarded,
            snapshot.malformed,
            snapshot.upstream_failed,
            snapshot.whitelisted,
            resolver.state().len(),
            snapshot.avg_response_ms
        );
    }
}
