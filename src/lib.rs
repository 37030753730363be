//! thermonode: edge temperature/humidity telemetry client
//!
//! Samples an SHT3x-class sensor over I²C on a fixed cadence and streams each
//! reading to a remote collector over a Socket.IO link. The link is owned by a
//! [`ConnectionManager`](thermonode_socket::ConnectionManager) that bounds every
//! connect attempt and forcibly renews long-lived sessions. Bus faults are
//! handed to an external recovery service that can power-cycle the sensor.
//!
//! ## Modules
//!
//! * `config`: TOML configuration with environment overrides for deployment
//!   secrets, validated with the `validator` crate.
//!
//! * `core`: Runtime components:
//!   - Sensor acquisition and raw-code conversion
//!   - Out-of-band bus recovery
//!   - The driving loop
//!
//! * `logger`: `tracing` subscriber setup with console output (compact,
//!   pretty, JSON) and optional systemd journald integration.
//!
//! ## Features
//!
//! * `socketio`: Socket.IO transport from `thermonode-socket` (default).
//! * `linux-i2c`: Linux `/dev/i2c-*` bus access via `linux-embedded-hal`
//!   (default).

pub mod config;
pub mod core;
pub mod logger;
