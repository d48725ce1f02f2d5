//! # Core Runtime Module
//!
//! Shared runtime infrastructure for the playback workspace:
//! - Logging and tracing bootstrap ([`logging`])
//! - Session configuration and capability injection ([`config`])
//! - Broadcast event bus ([`events`])

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
