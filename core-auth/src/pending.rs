//! Pending-Track Envelope and OAuth `state` codec
//!
//! Signing in to Spotify navigates away from the app entirely, so the track
//! the user was trying to play cannot live in memory or in any store the
//! redirect would wipe. It rides inside the authorization request's `state`
//! parameter instead and comes back on the callback URL.
//!
//! The wire form is URL-safe base64 (no padding) of
//! `{"csrf": "<16 alnum>", "pendingTrack": {...}}`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::time::Clock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Envelopes older than this are discarded instead of restored.
pub const PENDING_TRACK_MAX_AGE_MS: i64 = 5 * 60 * 1000;

const CSRF_LEN: usize = 16;

/// Minimal identity of the track a user tried to play before being sent
/// to the authorize page. Only identifiers travel; the full track is
/// re-fetched from the catalog on return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTrackEnvelope {
    pub platform_name: String,
    pub platform_id: String,
    pub feed_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast_hash: Option<String>,
    #[serde(default)]
    pub added_by: String,
    #[serde(default)]
    pub user_avatar: String,
    #[serde(default)]
    pub user_fid: String,
    /// Unix epoch milliseconds at creation.
    pub timestamp: i64,
}

impl PendingTrackEnvelope {
    pub fn new(
        platform_name: impl Into<String>,
        platform_id: impl Into<String>,
        feed_id: impl Into<String>,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            platform_name: platform_name.into(),
            platform_id: platform_id.into(),
            feed_id: feed_id.into(),
            cast_hash: None,
            added_by: String::new(),
            user_avatar: String::new(),
            user_fid: String::new(),
            timestamp: clock.unix_timestamp_millis(),
        }
    }

    pub fn with_cast_hash(mut self, cast_hash: impl Into<String>) -> Self {
        self.cast_hash = Some(cast_hash.into());
        self
    }

    pub fn with_author(
        mut self,
        added_by: impl Into<String>,
        user_avatar: impl Into<String>,
        user_fid: impl Into<String>,
    ) -> Self {
        self.added_by = added_by.into();
        self.user_avatar = user_avatar.into();
        self.user_fid = user_fid.into();
        self
    }

    pub fn age_ms(&self, clock: &dyn Clock) -> i64 {
        clock.unix_timestamp_millis() - self.timestamp
    }

    /// True once the envelope is more than five minutes old.
    pub fn is_stale(&self, clock: &dyn Clock) -> bool {
        self.age_ms(clock) > PENDING_TRACK_MAX_AGE_MS
    }
}

/// Decoded contents of the OAuth `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationState {
    pub csrf: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_track: Option<PendingTrackEnvelope>,
}

impl AuthorizationState {
    /// Fresh state with a random csrf token.
    pub fn new(pending_track: Option<PendingTrackEnvelope>) -> Self {
        Self {
            csrf: random_csrf(),
            pending_track,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AuthError::SerializationFailed(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Padding is tolerated because some hosts re-pad query values.
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim().trim_end_matches('='))
            .map_err(|e| AuthError::InvalidState(format!("not base64: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidState(format!("not a state payload: {}", e)))
    }
}

fn random_csrf() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualClock;
    use std::time::Duration;

    fn envelope(clock: &ManualClock) -> PendingTrackEnvelope {
        PendingTrackEnvelope::new("spotify", "4uLU6hMCjMI75M1A2tKUQC", "home", clock)
            .with_cast_hash("0xabc")
            .with_author("alice", "https://img/alice.png", "42")
    }

    #[test]
    fn test_csrf_is_sixteen_alphanumerics() {
        let state = AuthorizationState::new(None);
        assert_eq!(state.csrf.len(), 16);
        assert!(state.csrf.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(state.csrf, AuthorizationState::new(None).csrf);
    }

    #[test]
    fn test_state_survives_the_redirect() {
        let clock = ManualClock::from_millis(1_700_000_000_000);
        let state = AuthorizationState::new(Some(envelope(&clock)));

        let encoded = state.encode().unwrap();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let decoded = AuthorizationState::decode(&encoded).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let clock = ManualClock::from_millis(5);
        let json = serde_json::to_value(AuthorizationState {
            csrf: "abc".into(),
            pending_track: Some(envelope(&clock)),
        })
        .unwrap();

        let pending = &json["pendingTrack"];
        assert_eq!(pending["platformName"], "spotify");
        assert_eq!(pending["feedId"], "home");
        assert_eq!(pending["castHash"], "0xabc");
        assert_eq!(pending["userFid"], "42");
        assert_eq!(pending["timestamp"], 5);
    }

    #[test]
    fn test_state_without_pending_track_omits_field() {
        let state = AuthorizationState {
            csrf: "abc".into(),
            pending_track: None,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"csrf":"abc"}"#);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            AuthorizationState::decode("%%%"),
            Err(AuthError::InvalidState(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            AuthorizationState::decode(&not_json),
            Err(AuthError::InvalidState(_))
        ));
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let state = AuthorizationState {
            csrf: "x".into(),
            pending_track: None,
        };
        let padded = format!("{}==", state.encode().unwrap());
        assert_eq!(AuthorizationState::decode(&padded).unwrap(), state);
    }

    #[test]
    fn test_staleness_window_is_five_minutes() {
        let clock = ManualClock::from_millis(0);
        let pending = envelope(&clock);

        clock.advance(Duration::from_secs(299));
        assert!(!pending.is_stale(&clock));

        clock.advance(Duration::from_secs(1));
        assert!(!pending.is_stale(&clock));

        clock.advance(Duration::from_millis(1));
        assert!(pending.is_stale(&clock));
    }
}
