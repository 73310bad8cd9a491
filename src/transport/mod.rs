//! Transport layer for the relay.
//!
//! Receives DNS queries from clients, forwards them to the upstream server
//! and hands both messages to the [`Resolver`] on the way back.

pub mod udp;

/// Largest UDP datagram accepted from clients or the upstream.
pub const MAX_DNS_PACKET_SIZE: usize = 65_535;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::resolver::Resolver;
use crate::stats::Stats;
use crate::whitelist::Submitter;

/// Everything an exchange task needs, cloned into each task.
#[derive(Clone)]
pub struct RelayContext {
    pub upstream: SocketAddr,
    /// How long to wait for the upstream reply.
    pub timeout: Duration,
    pub resolver: Arc<Resolver>,
    pub submitter: Submitter,
    pub stats: Arc<Stats>,
}
