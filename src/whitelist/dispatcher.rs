//! Background execution of whitelist requests.
//!
//! The whitelist program can take a while (it edits routes and firewall
//! rules), so exchange tasks hand requests to a single worker and return to
//! the client straight away. Requests run one at a time in submission order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{WhitelistRequest, Whitelister};

/// Cheap handle used by exchange tasks to queue requests.
#[derive(Debug, Clone)]
pub struct Submitter {
    tx: mpsc::UnboundedSender<WhitelistRequest>,
}

impl Submitter {
    /// Queue a request without waiting for it to run.
    pub fn submit(&self, request: WhitelistRequest) {
        if let Err(e) = self.tx.send(request) {
            warn!(addresses = ?e.0.addresses, "whitelist dispatcher stopped, dropping request");
        }
    }
}

/// Owner of the background worker.
pub struct Dispatcher {
    submitter: Submitter,
    close: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the worker on the current runtime.
    pub fn spawn(whitelister: Arc<dyn Whitelister>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (close, close_rx) = oneshot::channel();
        let worker = tokio::spawn(run(rx, close_rx, whitelister));

        Self {
            submitter: Submitter { tx },
            close,
            worker,
        }
    }

    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Stop accepting requests and wait until every queued one has run.
    pub async fn shutdown(self) {
        let _ = self.close.send(());
        if let Err(e) = self.worker.await {
            error!("whitelist dispatcher failed: {}", e);
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<WhitelistRequest>,
    mut close: oneshot::Receiver<()>,
    whitelister: Arc<dyn Whitelister>,
) {
    loop {
        tokio::select! {
            request = rx.recv() => match request {
                Some(request) => apply_logged(whitelister.as_ref(), &request).await,
                None => return,
            },
            _ = &mut close => break,
        }
    }

    rx.close();
    while let Some(request) = rx.recv().await {
        apply_logged(whitelister.as_ref(), &request).await;
    }
}

/// Apply one request, logging the outcome. Failures are not retried.
pub async fn apply_logged(whitelister: &dyn Whitelister, request: &WhitelistRequest) {
    match whitelister.apply(request).await {
        Ok(()) => info!(
            addresses = ?request.addresses,
            comment = request.comment.as_deref().unwrap_or(""),
            remove = request.remove,
            "whitelist updated"
        ),
        Err(e) => error!(
            addresses = ?request.addresses,
            remove = request.remove,
            "whitelist request failed: {}",
            e
        ),
    }
}
