//! UDP transport for DNS queries.
//!
//! Every client datagram gets its own task and its own upstream socket, so a
//! slow upstream reply only ever holds up the exchange waiting for it.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::{MAX_DNS_PACKET_SIZE, RelayContext};
use crate::dns::Message;
use crate::error::RelayError;

/// UDP transport for the relay.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

/// A completed exchange.
struct Exchanged {
    domain: String,
    upstream_ms: f64,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve queries until `shutdown` resolves.
    ///
    /// Exchanges already in flight when that happens are allowed to finish
    /// before this returns.
    pub async fn run<F>(self, ctx: RelayContext, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let tracker = TaskTracker::new();
        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.socket.recv_from(&mut buf) => {
                    let (len, client) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("UDP recv error: {}", e);
                            continue;
                        }
                    };

                    ctx.stats.record_request();
                    tracker.spawn(handle_exchange(
                        self.socket.clone(),
                        buf[..len].to_vec(),
                        client,
                        ctx.clone(),
                    ));
                }
            }
        }

        tracker.close();
        debug!(in_flight = tracker.len(), "waiting for in-flight exchanges");
        tracker.wait().await;
    }
}

/// Run one exchange and log its outcome. Errors stay inside this task.
async fn handle_exchange(
    socket: Arc<UdpSocket>,
    query: Vec<u8>,
    client: SocketAddr,
    ctx: RelayContext,
) {
    let start_time = Instant::now();

    match exchange(&socket, &query, client, &ctx).await {
        Ok(done) => {
            let total_ms = start_time.elapsed().as_secs_f64() * 1000.0;
            ctx.stats.record_forwarded(total_ms);
            debug!(
                domain = %done.domain,
                %client,
                "FORWARDED total={:.3}ms upstream={:.3}ms",
                total_ms,
                done.upstream_ms
            );
        }
        Err(e @ RelayError::Malformed(_)) => {
            ctx.stats.record_malformed();
            warn!(%client, "dropping exchange: {}", e);
        }
        Err(e @ (RelayError::UpstreamTimeout { .. } | RelayError::UpstreamUnreachable { .. })) => {
            ctx.stats.record_upstream_failed();
            warn!(%client, "dropping exchange: {}", e);
        }
        Err(e @ RelayError::ClientUnreachable { .. }) => {
            warn!("{}", e);
        }
    }
}

async fn exchange(
    socket: &UdpSocket,
    query: &[u8],
    client: SocketAddr,
    ctx: &RelayContext,
) -> Result<Exchanged, RelayError> {
    let query_msg = Message::decode(query)?;

    let upstream_start = Instant::now();
    let reply = forward_to_upstream(query, ctx.upstream, ctx.timeout).await?;
    let upstream_ms = upstream_start.elapsed().as_secs_f64() * 1000.0;

    let reply_msg = Message::decode(&reply)?;
    let requests = ctx.resolver.process_response(&query_msg, &reply_msg);

    let sent = socket.send_to(&reply, client).await;

    // Addresses are already recorded as whitelisted, so submit even when the
    // client has gone away.
    for request in requests {
        ctx.stats.record_whitelisted(request.addresses.len());
        ctx.submitter.submit(request);
    }

    sent.map_err(|source| RelayError::ClientUnreachable { client, source })?;

    Ok(Exchanged {
        domain: query_msg.query_name().unwrap_or("<unknown>").to_string(),
        upstream_ms,
    })
}

/// Send a query to the upstream over a fresh socket and wait for one reply.
///
/// The socket is connected, so datagrams from any other peer are discarded
/// by the kernel.
pub async fn forward_to_upstream(
    query: &[u8],
    upstream: SocketAddr,
    timeout: Duration,
) -> Result<Vec<u8>, RelayError> {
    let unreachable = |source: io::Error| RelayError::UpstreamUnreachable { upstream, source };

    let local: SocketAddr = if upstream.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await.map_err(unreachable)?;
    socket.connect(upstream).await.map_err(unreachable)?;
    socket.send(query).await.map_err(unreachable)?;

    let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
    let len = match tokio::time::timeout(timeout, socket.recv(&mut buf)).await {
        Ok(result) => result.map_err(unreachable)?,
        Err(_) => return Err(RelayError::UpstreamTimeout { upstream, timeout }),
    };
    buf.truncate(len);

    Ok(buf)
}
