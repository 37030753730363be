//! # thermonode-socket: bounded, self-renewing collector link
//!
//! This crate owns the connection between an edge node and the remote
//! collector. It does not retry or back off on its own: the caller drives it
//! once per cycle and the [`ConnectionManager`] decides what that cycle needs.
//!
//! - **Bounded connect**: every attempt is raced against a deadline and
//!   abandoned (dropped) when the deadline wins.
//! - **Forced renewal**: sessions older than the renewal threshold are closed
//!   and reopened, which clears links that report connected while the
//!   collector receives nothing.
//! - **Remote close tracking**: transport callbacks only enqueue
//!   notifications; the manager applies them on its next call.
//!
//! # Quick Start
//!
//! ```ignore
//! use thermonode_socket::{Config, ConnectionManager, SocketIoConnector};
//!
//! let config = Config { host: "http://localhost:3001".into(), ..Default::default() };
//! let deadline = config.connect_timeout();
//! let mut manager = ConnectionManager::new(SocketIoConnector::new(), config);
//!
//! if manager.ensure_connected(deadline).await.is_connected() {
//!     manager.emit(&reading).await?;
//! }
//! ```
//!
//! # Features
//!
//! * `socketio`: Socket.IO transport via `rust_socketio` (default: enabled).
//!   Without it only the [`Connector`]/[`Link`] traits are available.

pub mod config;
pub mod error;
pub mod link;
pub mod manager;
#[cfg(feature = "socketio")]
pub mod socketio;
pub mod state;

pub use config::Config;
pub use error::TransferError;
pub use link::{Connector, Link, LinkEvent, LinkEvents};
pub use manager::ConnectionManager;
#[cfg(feature = "socketio")]
pub use socketio::{SocketIoConnector, SocketIoLink};
pub use state::{ConnectionSession, ConnectionState};
