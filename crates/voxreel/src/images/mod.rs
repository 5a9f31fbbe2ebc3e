//! Scene images from remote providers.
//!
//! [`ImageSource`] walks the configured providers in order, retrying each
//! with backoff, and only hands back bytes that look like a real picture.
//! The network sits behind [`ImageFetcher`] so the pipeline can run without it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, warn};

use crate::config::{ImageProvider, SceneConfig};

mod error;
mod http;

pub use error::FetchError;
pub use http::HttpFetcher;

const POLLINATIONS_BASE: &str = "https://image.pollinations.ai/prompt";
const PICSUM_BASE: &str = "https://picsum.photos";

/// What to ask a provider for.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
}

impl ImageRequest {
    pub fn url(&self, provider: ImageProvider) -> Result<Url, FetchError> {
        let invalid = |reason: String| FetchError::Url { provider, reason };
        match provider {
            ImageProvider::Pollinations => {
                let mut url = Url::parse(POLLINATIONS_BASE).map_err(|e| invalid(e.to_string()))?;
                url.path_segments_mut()
                    .map_err(|_| invalid("base URL cannot carry a path".to_string()))?
                    .push(&self.prompt);
                url.query_pairs_mut()
                    .append_pair("width", &self.width.to_string())
                    .append_pair("height", &self.height.to_string())
                    .append_pair("nologo", "true")
                    .append_pair("seed", &self.seed.to_string());
                Ok(url)
            }
            ImageProvider::Picsum => Url::parse(&format!(
                "{}/{}/{}?random={}",
                PICSUM_BASE, self.width, self.height, self.seed
            ))
            .map_err(|e| invalid(e.to_string())),
        }
    }
}

/// One request to one provider; no retries.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, provider: ImageProvider, request: &ImageRequest) -> Result<Vec<u8>, FetchError>;
}

/// Accepts `bytes` only if they are long enough and start like a JPEG, PNG
/// or WebP file.
pub fn validate_image(bytes: Vec<u8>, min_bytes: usize) -> Result<Vec<u8>, FetchError> {
    if bytes.len() < min_bytes {
        return Err(FetchError::TooSmall { bytes: bytes.len() });
    }
    let known = bytes.starts_with(&[0xFF, 0xD8])
        || bytes.starts_with(b"\x89PNG")
        || bytes.starts_with(b"RIFF");
    if !known {
        return Err(FetchError::NotAnImage);
    }
    Ok(bytes)
}

pub struct ImageSource {
    fetcher: Arc<dyn ImageFetcher>,
    providers: Vec<ImageProvider>,
    max_attempts: u32,
    backoff: Vec<Duration>,
    min_bytes: usize,
}

impl ImageSource {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, config: &SceneConfig) -> Self {
        Self {
            fetcher,
            providers: config.providers.clone(),
            max_attempts: config.max_attempts.max(1),
            backoff: config
                .retry_backoff_secs
                .iter()
                .map(|secs| Duration::from_secs(*secs))
                .collect(),
            min_bytes: config.min_image_bytes,
        }
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// First valid image any provider returns, or `None` once every
    /// provider has used up its attempts.
    pub fn fetch(&self, request: &ImageRequest) -> Option<(ImageProvider, Vec<u8>)> {
        for &provider in &self.providers {
            match self.fetch_from(provider, request) {
                Ok(bytes) => return Some((provider, bytes)),
                Err(error) => warn!(%provider, %error, "image provider gave up"),
            }
        }
        None
    }

    fn fetch_from(&self, provider: ImageProvider, request: &ImageRequest) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 1;
        loop {
            let result = self
                .fetcher
                .fetch(provider, request)
                .and_then(|bytes| validate_image(bytes, self.min_bytes));
            match result {
                Ok(bytes) => return Ok(bytes),
                Err(error) if attempt >= self.max_attempts => return Err(error),
                Err(error) => {
                    let wait = self.backoff_before_retry(attempt);
                    debug!(%provider, attempt, %error, wait_secs = wait.as_secs(), "retrying image download");
                    thread::sleep(wait);
                    attempt += 1;
                }
            }
        }
    }

    /// Wait after failed attempt `attempt` (1-based); the last entry repeats.
    fn backoff_before_retry(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).saturating_sub(1);
        self.backoff
            .get(index)
            .or(self.backoff.last())
            .copied()
            .unwrap_or_default()
    }
}
