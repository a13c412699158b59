//! Fetch collaborator: retrieves raw responses from a service backend.
//!
//! The pipeline only depends on the [`Fetcher`] trait; tests substitute a
//! canned implementation. A body beginning with the literal `HTTP` marker is
//! treated as a connection failure downstream regardless of status code.

use tracing::warn;

/// Marker prefix identifying a connection-failure body.
pub const CONNECTION_FAILURE_PREFIX: &str = "HTTP";

/// Retrieves the raw response text for a case URL.
pub trait Fetcher {
    /// Fetch `path` relative to `server`, returning (body, status code).
    /// Transport errors are returned as (error text, 500) rather than
    /// propagated; the runner records them per case.
    fn fetch(&self, server: &str, path: &str) -> (String, u16);
}

/// Blocking HTTP fetcher over reqwest.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, server: &str, path: &str) -> (String, u16) {
        let url = join_url(server, path);
        match self.client.get(&url).send() {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text() {
                    Ok(text) => {
                        if text.starts_with(CONNECTION_FAILURE_PREFIX) {
                            warn!(%url, status, "connection failure marker in response body");
                        }
                        (text, status)
                    }
                    Err(err) => (err.to_string(), 500),
                }
            }
            Err(err) => (err.to_string(), 500),
        }
    }
}

/// Join a base server URL and a relative path with exactly one slash.
pub fn join_url(server: &str, path: &str) -> String {
    format!(
        "{}/{}",
        server.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://dev.example.org/", "/api/release/1"),
            "https://dev.example.org/api/release/1"
        );
        assert_eq!(
            join_url("https://dev.example.org", "api/release/1"),
            "https://dev.example.org/api/release/1"
        );
    }
}
