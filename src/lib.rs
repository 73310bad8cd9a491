//! Waypoint - a DNS relay that whitelists the addresses of matching domains.
//!
//! Queries are forwarded unmodified to an upstream resolver. When a reply
//! resolves a name matching one of the configured patterns, its new IPv4
//! addresses are handed to an external whitelist program, once each.

pub mod dns;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod transport;
pub mod whitelist;
