//! # Navigation
//!
//! Next/previous over the active playlist context, honouring shuffle and
//! repeat. Pure functions of the store plus an injected RNG; the
//! coordinator applies the outcome.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::store::PlaybackStore;
use crate::types::{RepeatMode, TrackSource};

/// What the coordinator should do after a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Make the track at `index` current.
    Selected { index: usize },
    /// Reload the current track from the start.
    Replay,
    /// End of list with repeat off: stop, keep the current track.
    Stopped,
    /// Nothing to do.
    Unchanged,
}

pub struct Navigator {
    rng: StdRng,
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic shuffle for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next(&mut self, store: &PlaybackStore) -> NavigationOutcome {
        let len = store.current_playlist_tracks().len();
        if len == 0 {
            return NavigationOutcome::Unchanged;
        }

        let current = store.current_track_index();
        if store.repeat_mode() == RepeatMode::One && current.is_some() {
            return NavigationOutcome::Replay;
        }

        let candidate = if store.shuffle_mode() {
            self.pick_other(len, current)
        } else {
            Some(current.map_or(0, |index| index + 1)).filter(|&index| index < len)
        };

        match candidate {
            Some(index) => NavigationOutcome::Selected { index },
            None if store.repeat_mode() == RepeatMode::All => {
                NavigationOutcome::Selected { index: 0 }
            }
            None => NavigationOutcome::Stopped,
        }
    }

    pub fn previous(&mut self, store: &PlaybackStore) -> NavigationOutcome {
        let len = store.current_playlist_tracks().len();
        let current = match store.current_track_index() {
            Some(index) if index > 0 => index,
            _ => return NavigationOutcome::Unchanged,
        };

        let index = if store.shuffle_mode() {
            self.pick_other(len, Some(current))
        } else {
            Some(current - 1)
        };

        index.map_or(NavigationOutcome::Unchanged, |index| {
            NavigationOutcome::Selected { index }
        })
    }

    /// Uniform pick among `0..len` except `exclude`.
    fn pick_other(&mut self, len: usize, exclude: Option<usize>) -> Option<usize> {
        let others: Vec<usize> = (0..len).filter(|&i| Some(i) != exclude).collect();
        others.choose(&mut self.rng).copied()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a track from `source` may start on its own once loaded.
///
/// YouTube never autoplays inside embedded webviews, and Spotify inside a
/// feed needs a user gesture to claim the device. Everything else starts
/// immediately.
pub fn allows_autoplay(source: TrackSource, from_feed: bool) -> bool {
    match source {
        TrackSource::Youtube => false,
        TrackSource::Spotify => !from_feed,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayableTrack, Track};
    use std::collections::HashSet;

    fn store_with(sources: &[TrackSource], current: usize) -> PlaybackStore {
        let tracks: Vec<Track> = sources
            .iter()
            .enumerate()
            .map(|(i, &source)| {
                let id = format!("t{}", i);
                Track::new(PlayableTrack::new(id.clone(), source, id, "title", "artist"))
            })
            .collect();
        let mut store = PlaybackStore::new();
        store.set_current_track(tracks.get(current).cloned());
        store.set_playlist("home", tracks);
        store.set_active_feed(Some("home".to_string()));
        store
    }

    const ABC: [TrackSource; 3] = [
        TrackSource::Youtube,
        TrackSource::Spotify,
        TrackSource::Soundcloud,
    ];

    #[test]
    fn test_sequential_next() {
        let store = store_with(&ABC, 0);
        let mut nav = Navigator::with_seed(1);
        assert_eq!(nav.next(&store), NavigationOutcome::Selected { index: 1 });
    }

    #[test]
    fn test_end_of_list() {
        let mut store = store_with(&ABC, 2);
        let mut nav = Navigator::with_seed(1);
        assert_eq!(nav.next(&store), NavigationOutcome::Stopped);

        store.set_repeat_mode(RepeatMode::All);
        assert_eq!(nav.next(&store), NavigationOutcome::Selected { index: 0 });
    }

    #[test]
    fn test_repeat_one_replays() {
        let mut store = store_with(&ABC, 1);
        store.set_repeat_mode(RepeatMode::One);
        store.set_shuffle_mode(true);
        let mut nav = Navigator::with_seed(1);
        assert_eq!(nav.next(&store), NavigationOutcome::Replay);
    }

    #[test]
    fn test_shuffle_never_picks_current_and_covers_others() {
        let mut store = store_with(&[TrackSource::Soundcloud; 5], 2);
        store.set_shuffle_mode(true);
        let mut nav = Navigator::with_seed(7);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            match nav.next(&store) {
                NavigationOutcome::Selected { index } => {
                    assert_ne!(index, 2);
                    seen.insert(index);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(seen, HashSet::from([0, 1, 3, 4]));
    }

    #[test]
    fn test_shuffle_single_track_acts_like_end_of_list() {
        let mut store = store_with(&[TrackSource::Soundcloud], 0);
        store.set_shuffle_mode(true);
        let mut nav = Navigator::with_seed(3);
        assert_eq!(nav.next(&store), NavigationOutcome::Stopped);

        store.set_repeat_mode(RepeatMode::All);
        assert_eq!(nav.next(&store), NavigationOutcome::Selected { index: 0 });
    }

    #[test]
    fn test_previous() {
        let store = store_with(&ABC, 0);
        let mut nav = Navigator::with_seed(1);
        assert_eq!(nav.previous(&store), NavigationOutcome::Unchanged);

        let store = store_with(&ABC, 2);
        assert_eq!(nav.previous(&store), NavigationOutcome::Selected { index: 1 });

        let mut store = store_with(&ABC, 1);
        store.set_shuffle_mode(true);
        for _ in 0..20 {
            assert!(matches!(
                nav.previous(&store),
                NavigationOutcome::Selected { index } if index != 1
            ));
        }
    }

    #[test]
    fn test_empty_context() {
        let store = PlaybackStore::new();
        let mut nav = Navigator::with_seed(1);
        assert_eq!(nav.next(&store), NavigationOutcome::Unchanged);
        assert_eq!(nav.previous(&store), NavigationOutcome::Unchanged);
    }

    #[test]
    fn test_autoplay_policy() {
        assert!(!allows_autoplay(TrackSource::Youtube, false));
        assert!(!allows_autoplay(TrackSource::Youtube, true));
        assert!(!allows_autoplay(TrackSource::Spotify, true));
        assert!(allows_autoplay(TrackSource::Spotify, false));
        assert!(allows_autoplay(TrackSource::Soundcloud, true));
        assert!(allows_autoplay(TrackSource::Songlink, true));
    }
}
