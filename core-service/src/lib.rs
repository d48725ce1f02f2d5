//! Core service façade and bootstrap helpers.
//!
//! This crate wires a [`PlayerConfig`](core_runtime::config::PlayerConfig)
//! and the host's vendor SDK bridges into one playback session: the link
//! resolver, the optional Spotify authenticator, the track catalog and the
//! coordinator with all five adapters. Desktop hosts enable the
//! `desktop-shims` feature so HTTP and secure storage default to
//! `bridge-desktop`.

pub mod error;
pub mod service;

pub use error::{CoreError, Result};
pub use service::{PlayerSdks, PlayerService};
