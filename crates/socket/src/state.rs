//! Connection state tracking for the event-stream client.
//!
//! The state is owned and mutated exclusively by the
//! [`ConnectionManager`](crate::manager::ConnectionManager). Observers that need
//! to react to transitions can subscribe through a watch channel.
//!
//! # Examples
//!
//! ```ignore
//! use thermonode_socket::ConnectionState;
//!
//! let state = ConnectionState::Connected;
//! println!("Status: {}", state);       // "Connected"
//! assert!(state.is_connected());
//! ```

use std::fmt;

use tokio::time::{Duration, Instant};

/// Represents the current state of the collector connection.
///
/// The lifecycle flows through these states:
/// - `Disconnected` -> `Connecting` -> `Connected` (connect finished inside the deadline)
/// - `Disconnected` -> `Connecting` -> `Disconnected` (deadline hit or connect error)
/// - `Connected` -> `Disconnected` (explicit disconnect, forced renewal, remote close)
///
/// There is no terminal state: the manager keeps cycling for the whole process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No usable link. This is the initial state.
    #[default]
    Disconnected,

    /// A connect attempt is racing against its deadline.
    ///
    /// Only observable through the state watch channel; `ensure_connected`
    /// never returns this value.
    Connecting,

    /// The link reports connected. Emits are only attempted in this state.
    Connected,
}

impl ConnectionState {
    /// Returns a short static identifier for the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }

    /// Returns true only in `Connected`.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping for the current session.
///
/// A session starts at each successful connect and ends at the next
/// disconnect, renewal or remote close. `last_connected_at` is set exactly
/// when the state moves into `Connected` and is cleared when it leaves it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSession {
    state: ConnectionState,
    last_connected_at: Option<Instant>,
}

impl ConnectionSession {
    /// Creates a fresh session in `Disconnected` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Instant of the last transition into `Connected`, if connected.
    pub fn last_connected_at(&self) -> Option<Instant> {
        self.last_connected_at
    }

    /// Age of the current session measured against `now`.
    ///
    /// Returns `None` when not connected.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        match self.state {
            ConnectionState::Connected => self
                .last_connected_at
                .map(|at| now.saturating_duration_since(at)),
            _ => None,
        }
    }

    /// Whether the session must be renewed given the renewal threshold.
    pub fn needs_renewal(&self, now: Instant, threshold: Duration) -> bool {
        self.age(now).is_some_and(|age| age >= threshold)
    }

    pub(crate) fn mark_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
        self.last_connected_at = None;
    }

    pub(crate) fn mark_connected(&mut self, at: Instant) {
        self.state = ConnectionState::Connected;
        self.last_connected_at = Some(at);
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.last_connected_at = None;
    }
}
