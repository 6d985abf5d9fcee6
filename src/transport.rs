//! Shared HTTP client construction.
//!
//! One `reqwest` client is built at startup and cloned into every provider
//! (cloning shares the underlying connection pool). The timeout comes from
//! configuration (`VASA_HTTP_TIMEOUT_SECS`).

use crate::Result;
use std::time::Duration;

/// Build the outbound HTTP client with production-friendly defaults.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(32)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_defaults() {
        assert!(build_http_client(Duration::from_secs(30)).is_ok());
    }
}
