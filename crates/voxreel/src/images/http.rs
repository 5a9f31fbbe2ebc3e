//! Downloads scene images over HTTPS with a blocking reqwest client.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::{FetchError, ImageFetcher, ImageRequest};
use crate::config::ImageProvider;

/// Some providers refuse requests without a browser-like agent.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub struct HttpFetcher {
    timeout: Duration,
    client: OnceLock<Client>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    /// Shared client, built on first use so pipelines without providers
    /// never touch TLS setup.
    fn client(&self) -> Result<&Client, FetchError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, provider: ImageProvider, request: &ImageRequest) -> Result<Vec<u8>, FetchError> {
        let url = request.url(provider)?;
        debug!(%provider, %url, "requesting scene image");

        let response = self
            .client()?
            .get(url)
            .send()
            .map_err(|source| FetchError::Http { provider, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                provider,
                status: status.as_u16(),
            });
        }
        let body = response
            .bytes()
            .map_err(|source| FetchError::Http { provider, source })?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_built_once() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5));
        let first = fetcher.client().unwrap() as *const Client;
        let second = fetcher.client().unwrap() as *const Client;
        assert_eq!(first, second);
    }
}
