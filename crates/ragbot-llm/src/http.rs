//! Shared HTTP client construction for the REST collaborators (vector index, model hosts).

use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client with 30s connect and 60s request timeouts.
#[must_use]
pub fn default_client() -> reqwest::Client {
    client_with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
}

/// Build a client with rustls TLS, a `ragbot/{version}` user-agent and at most 10 redirects.
///
/// A zero `request` timeout disables the per-request deadline.
#[must_use]
pub fn client_with_timeouts(connect: Duration, request: Duration) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(connect)
        .user_agent(concat!("ragbot/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10));
    if !request.is_zero() {
        builder = builder.timeout(request);
    }
    builder
        .build()
        .expect("HTTP client construction with static settings must not fail")
}
