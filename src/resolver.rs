//! Whitelist decisions for relayed DNS exchanges.
//!
//! Handles the core matching pipeline:
//! 1. Group the reply's A records by owner name
//! 2. Match each name against the configured patterns
//! 3. Keep only addresses never whitelisted before
//!
//! Transports handle the actual I/O, resolver handles decisions.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::dns::Message;
use crate::filter::Patterns;
use crate::whitelist::{WhitelistRequest, WhitelistState};

/// Resolver decides which resolved addresses to whitelist.
///
/// Shared by every exchange task. The only mutable part is the
/// [`WhitelistState`], which serialises its own updates.
pub struct Resolver {
    patterns: Patterns,
    state: Arc<WhitelistState>,
}

impl Resolver {
    pub fn new(patterns: Patterns, state: Arc<WhitelistState>) -> Self {
        Self { patterns, state }
    }

    /// Process an upstream reply and return the whitelist requests it calls for.
    ///
    /// Addresses in the returned requests are already recorded as
    /// whitelisted, so the caller must submit them; they will never be
    /// returned again. Names are visited in sorted order and addresses are
    /// sorted numerically, which makes the outcome deterministic when the
    /// same address appears under several matching names: only the first
    /// name gets it.
    ///
    /// A message without the QR bit is not a reply and whitelists nothing.
    pub fn process_response(&self, query: &Message, response: &Message) -> Vec<WhitelistRequest> {
        if !response.header.is_response() {
            debug!(id = response.header.id, "upstream message is not a reply");
            return Vec::new();
        }

        let asked = query.query_name().unwrap_or("<unknown>");
        let mut requests = Vec::new();

        for (name, addrs) in answer_addresses(response) {
            let Some(pattern) = self.patterns.first_match(&name) else {
                continue;
            };

            let fresh = self.state.claim(addrs.iter().map(Ipv4Addr::to_string));
            if fresh.is_empty() {
                debug!(%name, pattern, "addresses already whitelisted");
                continue;
            }

            debug!(%name, pattern, addresses = ?fresh, "matched new addresses");
            requests.push(WhitelistRequest::add(fresh, comment(&name, asked, Utc::now())));
        }

        requests
    }

    /// Requests that undo every whitelisting done so far, one per address.
    ///
    /// Empty when whitelisted addresses are to be kept on exit.
    pub fn shutdown_requests(&self, keep: bool) -> Vec<WhitelistRequest> {
        if keep {
            return Vec::new();
        }

        self.state
            .snapshot()
            .into_iter()
            .map(|addr| WhitelistRequest::remove(vec![addr]))
            .collect()
    }

    pub fn state(&self) -> &Arc<WhitelistState> {
        &self.state
    }

    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }
}

/// IPv4 addresses in the answer section, grouped by owner name.
///
/// Records that are not A records are skipped.
pub fn answer_addresses(response: &Message) -> BTreeMap<String, BTreeSet<Ipv4Addr>> {
    let mut by_name: BTreeMap<String, BTreeSet<Ipv4Addr>> = BTreeMap::new();

    for record in &response.answers {
        if let Ok(addr) = record.ipv4() {
            by_name.entry(record.name.clone()).or_default().insert(addr);
        }
    }

    by_name
}

fn comment(name: &str, asked: &str, at: DateTime<Utc>) -> String {
    let at = at.to_rfc3339_opts(SecondsFormat::Secs, true);
    if name == asked {
        format!("{name} {at}")
    } else {
        format!("{name} ({asked}) {at}")
    }
}
