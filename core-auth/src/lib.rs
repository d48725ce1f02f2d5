//! # Authentication Module
//!
//! Spotify sign-in for the multi-source player.
//!
//! ## Overview
//!
//! Spotify is the only platform that needs a user token: the Web Playback
//! SDK refuses to start without one. This crate runs the OAuth 2.0 PKCE
//! flow, keeps tokens in the host's secure store, refreshes them before
//! expiry and carries a Pending-Track Envelope through the redirect so
//! playback can resume on return.
//!
//! ## Features
//!
//! - Authorization URL with S256 challenge and a csrf-protected `state`
//! - Code exchange and refresh with bounded retries
//! - Token persistence via [`bridge_traits::SecureStore`]
//! - [`AccessTokenProvider`] for the Spotify player
//! - Auth events on the core event bus

pub mod error;
pub mod oauth;
pub mod pending;
pub mod spotify;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use pending::{AuthorizationState, PendingTrackEnvelope, PENDING_TRACK_MAX_AGE_MS};
pub use spotify::{AccessTokenProvider, CallbackOutcome, SpotifyAuthenticator};
pub use token_store::TokenStore;
pub use types::{AuthState, OAuthTokens, ProviderKind};
