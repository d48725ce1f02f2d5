//! Vendor player integrations, one per [`TrackSource`](crate::types::TrackSource).

pub mod resolving;
pub mod soundcloud;
pub mod spotify;
pub mod youtube;

pub use resolving::ResolvingAdapter;
pub use soundcloud::{SoundCloudAdapter, SoundCloudUrlResolver};
pub use spotify::{SpotifyAdapter, SpotifyConnectClient, SpotifyItem};
pub use youtube::{normalize_youtube_id, YouTubeAdapter};
