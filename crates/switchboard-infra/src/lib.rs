//! Infrastructure layer for Switchboard.
//!
//! Implements the ports defined in `switchboard-core`: the SQLite event
//! store, console and JSON-lines subscribers, the config file loader, and
//! the bootstrap that wires them into an `EventLogger`.

pub mod bootstrap;
pub mod config;
pub mod sqlite;
pub mod subscriber;
