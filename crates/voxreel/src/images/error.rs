use thiserror::Error;

use crate::config::ImageProvider;

/// Why one download of a scene image did not produce a usable picture.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid {provider} URL: {reason}")]
    Url {
        provider: ImageProvider,
        reason: String,
    },

    #[error("request to {provider} failed: {source}")]
    Http {
        provider: ImageProvider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} answered HTTP {status}")]
    Status { provider: ImageProvider, status: u16 },

    #[error("response too small ({bytes} bytes), likely not a real image")]
    TooSmall { bytes: usize },

    #[error("response is not a JPEG, PNG or WebP image")]
    NotAnImage,
}
