//! Transport seam between the connection manager and a concrete client.
//!
//! A [`Connector`] produces a live [`Link`]; the manager owns at most one link
//! at a time. Asynchronous notifications from the transport (the remote side
//! closing the link) are pushed into a per-link [`LinkEvents`] channel which
//! the manager drains on its own schedule, so no callback ever mutates the
//! session directly.

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use super::error::TransferError;

/// Notifications raised by a transport after the link was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The remote side or the network closed the link.
    Closed(String),
}

/// Sending half handed to the transport; one per connect attempt.
pub type LinkEvents = mpsc::UnboundedSender<LinkEvent>;

/// Creates live links to the collector.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Link type produced on success.
    type Link: Link;

    /// Opens a link to `url`.
    ///
    /// The returned future may be dropped at any await point when the connect
    /// deadline fires; implementations must not leak handles in that case.
    async fn connect(&self, url: &Url, events: LinkEvents) -> Result<Self::Link, TransferError>;
}

/// An established connection able to carry named events.
#[async_trait::async_trait]
pub trait Link: Send + Sync {
    /// Sends `event` with a JSON object payload.
    async fn emit(&self, event: &str, payload: Value) -> Result<(), TransferError>;

    /// Closes the link. Called at most once per link.
    async fn close(&self) -> Result<(), TransferError>;
}
