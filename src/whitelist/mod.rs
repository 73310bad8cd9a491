//! Whitelist bookkeeping and the external whitelist program.
//!
//! [`WhitelistState`] remembers every address handed to the whitelist
//! program during this process lifetime so that no address is ever
//! submitted twice. Requests themselves go through a [`Whitelister`],
//! normally run in the background by a [`Dispatcher`].

mod command;
mod dispatcher;

pub use command::{CommandWhitelister, Whitelister};
pub use dispatcher::{Dispatcher, Submitter, apply_logged};

use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashSet;

/// One invocation of the whitelist program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistRequest {
    /// Addresses (IPv4 literals or host names), in the order to submit them.
    pub addresses: Vec<String>,
    /// Human readable note stored alongside the route or rule.
    pub comment: Option<String>,
    /// Remove instead of add.
    pub remove: bool,
}

impl WhitelistRequest {
    pub fn add(addresses: Vec<String>, comment: impl Into<String>) -> Self {
        Self {
            addresses,
            comment: Some(comment.into()),
            remove: false,
        }
    }

    pub fn remove(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            comment: None,
            remove: true,
        }
    }
}

/// Addresses already submitted for whitelisting.
///
/// Grows only. Shared by every exchange task; all access goes through one
/// lock so that checking and recording an address is a single step.
#[derive(Debug, Default)]
pub struct WhitelistState {
    addresses: Mutex<FxHashSet<String>>,
}

impl WhitelistState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every candidate not seen before and return those, in
    /// candidate order.
    ///
    /// Two concurrent callers with overlapping candidates never both get the
    /// same address back.
    pub fn claim<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut addresses = self.addresses.lock().unwrap_or_else(PoisonError::into_inner);

        candidates
            .into_iter()
            .map(Into::into)
            .filter(|addr| addresses.insert(addr.clone()))
            .collect()
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(addr)
    }

    /// Every recorded address, sorted.
    pub fn snapshot(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
