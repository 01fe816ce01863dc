use std::time::Duration;
use thiserror::Error;

/// Network failures from the probe, document, and payload fetch paths.
///
/// For the metadata probe a fetch error means "no metadata", not rejection;
/// for a payload fetch it is terminal for that single item. There is no
/// retry anywhere.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported url scheme in {0}")]
    Scheme(String),
}

/// Classification rejected a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The source resolved to an HTML page. Not necessarily terminal: with
    /// enough crawl depth the collector expands the page instead.
    #[error("resolved to an html page")]
    Html,

    /// Genuinely not an image; carries whatever type was determined.
    #[error("not an image: {0:?}")]
    NotAnImage(String),
}
