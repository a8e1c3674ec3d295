//! Sentinel Hub Process API.
mod auth;
mod provider;

pub use auth::Credentials;
pub use provider::{Provider, SentinelHubConfig};
