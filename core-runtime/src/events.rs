//! # Event Bus System
//!
//! Broadcast channel for observers of a playback session (UI shells,
//! analytics hooks, debugging tools). The coordinator never depends on
//! anybody listening: emitting with zero subscribers is a no-op.
//!
//! ```text
//! ┌─────────────┐  emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ Coordinator ├────────>│          ├────────────>│  UI shell  │
//! ├─────────────┤         │ EventBus │             └────────────┘
//! │ Resolver    ├────────>│          │  subscribe  ┌────────────┐
//! ├─────────────┤         │          ├────────────>│  Analytics │
//! │ Spotify auth├────────>│          │             └────────────┘
//! └─────────────┘         └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//! bus.emit(CoreEvent::Playback(PlaybackEvent::ErrorCleared)).ok();
//! assert!(rx.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};

/// Default buffer size for the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Auth(AuthEvent),
    Resolver(ResolverEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Resolver(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. })
            | CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::ResolutionFailed { .. })
            | CoreEvent::Resolver(ResolverEvent::RateLimited { .. })
            | CoreEvent::Resolver(ResolverEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::TrackChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::SourceSwitched { .. })
            | CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Observable transitions of the playback session.
///
/// Sources are carried as their wire names (`youtube`, `spotify`,
/// `soundcloud`, `songlink`, `apple_music`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A different track became current.
    TrackChanged {
        track_id: String,
        source: String,
        title: String,
        autoplay: bool,
    },
    PlayStateChanged {
        track_id: String,
        is_playing: bool,
    },
    PositionChanged {
        track_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
    TrackEnded {
        track_id: String,
    },
    /// End of the playlist reached with repeat off.
    Stopped {
        track_id: String,
    },
    /// The mounted adapter changed. `from` is `None` for the first mount.
    SourceSwitched {
        from: Option<String>,
        to: String,
    },
    /// A songlink/Apple Music track was rewritten to a playable platform.
    TrackResolved {
        track_id: String,
        from: String,
        to: String,
        platform_id: String,
    },
    /// Resolution failed; the UI should offer to open the link externally.
    ResolutionFailed {
        track_id: String,
        message: String,
        external_url: Option<String>,
    },
    Error {
        track_id: Option<String>,
        message: String,
        auto_skip: bool,
    },
    ErrorCleared,
    PlayerClosed,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Track changed",
            PlaybackEvent::PlayStateChanged { .. } => "Play state changed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::TrackEnded { .. } => "Track ended",
            PlaybackEvent::Stopped { .. } => "Reached end of playlist",
            PlaybackEvent::SourceSwitched { .. } => "Active player switched",
            PlaybackEvent::TrackResolved { .. } => "Track link resolved",
            PlaybackEvent::ResolutionFailed { .. } => "Track link could not be resolved",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::ErrorCleared => "Playback error cleared",
            PlaybackEvent::PlayerClosed => "Player closed",
        }
    }
}

// ============================================================================
// Authentication Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// The user is being sent to the provider's authorize page.
    AuthorizationStarted {
        provider: String,
        has_pending_track: bool,
    },
    SignedIn {
        provider: String,
    },
    TokenRefreshed {
        provider: String,
        /// Unix epoch seconds.
        expires_at: i64,
    },
    SignedOut {
        provider: String,
    },
    AuthError {
        provider: String,
        message: String,
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::AuthorizationStarted { .. } => "Authorization started",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::SignedOut { .. } => "User signed out",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Resolver Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ResolverEvent {
    Resolved {
        url: String,
        platform: String,
        platform_id: String,
    },
    CacheHit {
        url: String,
    },
    RateLimited {
        url: String,
    },
    Failed {
        url: String,
        message: String,
        cached: bool,
    },
}

impl ResolverEvent {
    fn description(&self) -> &str {
        match self {
            ResolverEvent::Resolved { .. } => "Link resolved",
            ResolverEvent::CacheHit { .. } => "Resolution served from cache",
            ResolverEvent::RateLimited { .. } => "Resolution rate limited",
            ResolverEvent::Failed { .. } => "Resolution failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus.
///
/// Cloning shares the underlying channel. Slow subscribers get
/// `RecvError::Lagged` instead of blocking emitters.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publish to all current subscribers. Errors only when nobody is
    /// subscribed, which callers are free to ignore.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let bus = EventBus::new(16);
/// let playback_only = bus.stream().filter(|e| matches!(e, CoreEvent::Playback(_)));
/// # drop(playback_only);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Next event passing the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` when `n` events were dropped for this
    /// subscriber; `RecvError::Closed` once every bus handle is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when drained.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_changed(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::TrackChanged {
            track_id: id.to_string(),
            source: "youtube".to_string(),
            title: "Song".to_string(),
            autoplay: false,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(track_changed("a")).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(track_changed("a")).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), track_changed("a"));
        assert_eq!(second.recv().await.unwrap(), track_changed("a"));
    }

    #[tokio::test]
    async fn test_filtered_stream_skips_other_domains() {
        let bus = EventBus::new(8);
        let mut stream = bus
            .stream()
            .filter(|e| matches!(e, CoreEvent::Resolver(_)));

        bus.emit(track_changed("a")).ok();
        bus.emit(CoreEvent::Resolver(ResolverEvent::CacheHit {
            url: "https://song.link/x".to_string(),
        }))
        .ok();

        let event = stream.recv().await.unwrap();
        assert!(matches!(event, CoreEvent::Resolver(ResolverEvent::CacheHit { .. })));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_told() {
        let bus = EventBus::new(2);
        let mut stream = bus.stream();
        for i in 0..5 {
            bus.emit(track_changed(&i.to_string())).ok();
        }
        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
    }

    #[test]
    fn test_severity_mapping() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: Some("t".to_string()),
            message: "Spotify playback failed".to_string(),
            auto_skip: true,
        });
        assert_eq!(error.severity(), EventSeverity::Error);

        let limited = CoreEvent::Resolver(ResolverEvent::RateLimited {
            url: "u".to_string(),
        });
        assert_eq!(limited.severity(), EventSeverity::Warning);
        assert_eq!(track_changed("a").severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::ErrorCleared).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_value(CoreEvent::Playback(PlaybackEvent::SourceSwitched {
            from: Some("youtube".to_string()),
            to: "spotify".to_string(),
        }))
        .unwrap();

        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "SourceSwitched");
        assert_eq!(json["payload"]["to"], "spotify");
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(track_changed("a").description(), "Track changed");
        let auth = CoreEvent::Auth(AuthEvent::SignedOut {
            provider: "spotify".to_string(),
        });
        assert_eq!(auth.description(), "User signed out");
    }
}
