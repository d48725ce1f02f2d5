//! # Desktop Bridge Implementations
//!
//! Default host capabilities for native builds:
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the `keyring` crate
//!
//! Vendor player SDKs have no desktop implementation; native hosts embed a
//! web view and implement the `bridge_traits::players` traits over it.
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)

mod http;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
