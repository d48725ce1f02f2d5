//! # Link Resolution
//!
//! Maps ambiguous cross-platform links (song.link, Apple Music) to a
//! platform the player can drive, via the Odesli API.
//!
//! - [`OdesliResolver`]: cached, rate-limited resolution
//! - [`extract`]: platform id extraction from YouTube, Spotify and
//!   SoundCloud URLs

pub mod error;
pub mod extract;
pub mod rate_limit;
pub mod resolver;
pub mod types;

pub use error::{ResolverError, Result};
pub use resolver::OdesliResolver;
pub use types::{CacheStats, ResolvedLink, ResolvedPlatform, Resolution};
