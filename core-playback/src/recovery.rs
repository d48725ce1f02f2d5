//! # Pending-Track Recovery
//!
//! Resumes the track a user was trying to play before the Spotify sign-in
//! redirect. The envelope only carries identifiers, so the track is looked
//! up again in the [`TrackCatalog`] and played as a one-track context under
//! the envelope's feed id.

use bridge_traits::time::Clock;
use core_auth::PendingTrackEnvelope;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::TrackCatalog;
use crate::error::Result;
use crate::types::{Track, TrackDecoration};

/// Anything that can start playback inside a feed context.
#[cfg_attr(test, mockall::automock)]
pub trait FeedPlayback: Send + Sync {
    fn play_track_from_feed(&self, track: Track, feed_tracks: Vec<Track>, feed_id: String) -> Result<()>;
}

pub struct PendingTrackRecovery {
    catalog: Arc<dyn TrackCatalog>,
    clock: Arc<dyn Clock>,
}

impl PendingTrackRecovery {
    pub fn new(catalog: Arc<dyn TrackCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    /// Returns true if playback was handed to `player`. Every failure is
    /// logged and swallowed; the user just is not auto-resumed.
    pub async fn restore(&self, envelope: &PendingTrackEnvelope, player: &dyn FeedPlayback) -> bool {
        if envelope.is_stale(self.clock.as_ref()) {
            info!(
                age_ms = envelope.age_ms(self.clock.as_ref()),
                "Pending track is stale, not restoring"
            );
            return false;
        }

        let track = match self
            .catalog
            .fetch_track(&envelope.platform_name, &envelope.platform_id)
            .await
        {
            Ok(track) => track.with_decoration(decoration_from(envelope)),
            Err(e) => {
                warn!(
                    platform = %envelope.platform_name,
                    platform_id = %envelope.platform_id,
                    error = %e,
                    "Failed to restore pending track"
                );
                return false;
            }
        };

        info!(track_id = %track.id(), feed_id = %envelope.feed_id, "Restoring pending track");
        match player.play_track_from_feed(track.clone(), vec![track], envelope.feed_id.clone()) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Player rejected restored track");
                false
            }
        }
    }
}

fn decoration_from(envelope: &PendingTrackEnvelope) -> TrackDecoration {
    TrackDecoration {
        added_by: envelope.added_by.clone(),
        user_avatar: envelope.user_avatar.clone(),
        user_fid: envelope.user_fid.clone(),
        cast_hash: envelope.cast_hash.clone(),
        timestamp: Some(envelope.timestamp),
        ..TrackDecoration::default()
    }
}
