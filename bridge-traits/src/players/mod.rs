//! Vendor media SDK surfaces.
//!
//! Each vendor SDK is a black box that the host embeds (an iframe, a web
//! playback device, a widget). The core only sees the small method/event
//! surface documented by the vendor, expressed here as traits plus a typed
//! event enum delivered over an unbounded channel.
//!
//! Event channels are handed to the SDK at construction; the SDK must stop
//! sending once the player/widget is destroyed. Sends into a closed channel
//! are ignored by implementations.

pub mod soundcloud;
pub mod spotify;
pub mod youtube;

pub use soundcloud::{SoundCloudWidget, SoundCloudWidgetApi, SoundCloudWidgetEvent};
pub use spotify::{SpotifyPlaybackState, SpotifySdkEvent, SpotifyWebPlaybackSdk, SpotifyWebPlayer};
pub use youtube::{YouTubeEvent, YouTubeIframeApi, YouTubePlayer, YouTubePlayerState};
