use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Provider {provider} authentication failed: {reason}")]
    AuthenticationFailed { provider: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Invalid OAuth state parameter: {0}")]
    InvalidState(String),

    #[error("No PKCE verifier stored for this authorization")]
    MissingVerifier,

    #[error("Invalid authorization code: {0}")]
    InvalidAuthCode(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Token serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Stored token is corrupted: {0}")]
    TokenCorrupted(String),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether retrying the same operation later can succeed.
    ///
    /// A rejected code or a tampered state will not get better by waiting;
    /// network trouble and refresh failures might.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::NetworkError(_)
                | AuthError::TokenRefreshFailed(_)
                | AuthError::SecureStorageUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
