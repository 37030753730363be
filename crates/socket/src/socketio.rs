//! Socket.IO transport built on the `rust_socketio` async client.
//!
//! The client's own reconnection is switched off: reconnect and renewal
//! decisions belong to the [`ConnectionManager`](crate::ConnectionManager).
//! Close and error notifications are forwarded into the link's event channel
//! and acted upon by the manager at its next cycle.

use futures_util::FutureExt;
use rust_socketio::{
    asynchronous::{Client, ClientBuilder},
    Event, Payload,
};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{
    error::TransferError,
    link::{Connector, Link, LinkEvent, LinkEvents},
};

const NAMESPACE: &str = "/";

/// Opens Socket.IO links on the default namespace.
#[derive(Debug, Clone, Default)]
pub struct SocketIoConnector;

impl SocketIoConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Connector for SocketIoConnector {
    type Link = SocketIoLink;

    async fn connect(&self, url: &Url, events: LinkEvents) -> Result<SocketIoLink, TransferError> {
        let on_close = events.clone();
        let on_error = events;

        let client = ClientBuilder::new(url.as_str())
            .namespace(NAMESPACE)
            .reconnect(false)
            .on(Event::Close, move |_payload: Payload, _client: Client| {
                let tx = on_close.clone();
                async move {
                    let _ = tx.send(LinkEvent::Closed("closed by collector".to_string()));
                }
                .boxed()
            })
            .on(Event::Error, move |payload: Payload, _client: Client| {
                let tx = on_error.clone();
                async move {
                    warn!("Socket.IO error: {:?}", payload);
                    let _ = tx.send(LinkEvent::Closed(format!("transport error: {payload:?}")));
                }
                .boxed()
            })
            .connect()
            .await?;

        debug!("Socket.IO handshake completed with {}", url);
        Ok(SocketIoLink { client })
    }
}

/// A connected Socket.IO client.
pub struct SocketIoLink {
    client: Client,
}

#[async_trait::async_trait]
impl Link for SocketIoLink {
    async fn emit(&self, event: &str, payload: Value) -> Result<(), TransferError> {
        self.client
            .emit(event, payload)
            .await
            .map_err(|e| TransferError::Emit(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransferError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransferError::Close(e.to_string()))
    }
}
