//! Integration tests for the logging bootstrap.

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_query, LogFormat, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_second_initialization_is_a_config_error() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    // Another test binary may already own the global subscriber, so only
    // the second call is asserted.
    let _ = init_logging(config.clone());
    let second = init_logging(config);

    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_oauth_material_is_redacted() {
    for field in ["access_token", "refresh_token", "code_verifier", "code", "state"] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]", "{field}");
    }
}

#[test]
fn test_playback_fields_pass_through() {
    assert_eq!(redact_if_sensitive("source", "spotify"), "spotify");
    assert_eq!(redact_if_sensitive("error_code", "150"), "150");
    assert_eq!(redact_if_sensitive("feed_id", "home"), "home");
}

#[test]
fn test_callback_urls_lose_their_query() {
    let url = "http://127.0.0.1:5173/callback?code=AQD&state=eyJjc3JmIjoi";
    assert_eq!(strip_query(url), "http://127.0.0.1:5173/callback");
}
