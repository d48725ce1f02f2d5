//! # Host Bridge Traits
//!
//! Capabilities the playback core needs from its host, plus the black-box
//! surfaces of the vendor media SDKs it coordinates.
//!
//! ## Traits
//!
//! ### Networking & Storage
//! - [`HttpClient`](http::HttpClient) - Backend proxy, Spotify Connect, oEmbed
//! - [`SecureStore`](storage::SecureStore) - OAuth tokens and PKCE verifier
//!
//! ### Vendor SDKs
//! - [`YouTubeIframeApi`](players::YouTubeIframeApi) / [`YouTubePlayer`](players::YouTubePlayer)
//! - [`SpotifyWebPlaybackSdk`](players::SpotifyWebPlaybackSdk) / [`SpotifyWebPlayer`](players::SpotifyWebPlayer)
//! - [`SoundCloudWidgetApi`](players::SoundCloudWidgetApi) / [`SoundCloudWidget`](players::SoundCloudWidget)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability
//! is missing instead of silently degrading:
//!
//! ```ignore
//! let http_client = builder.http_client.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "HttpClient".to_string(),
//!     message: "Enable desktop-shims or inject a host adapter".to_string(),
//! })?;
//! ```
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so implementations can be shared as
//! `Arc<dyn Trait>` across adapter tasks.

pub mod error;
pub mod http;
pub mod players;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{MemorySecureStore, SecureStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
