use serde::{Deserialize, Serialize};

/// Identifies the page/panel a scan or download session belongs to. Sessions
/// are keyed by tab so a new save request can replace the previous one.
pub type TabId = u64;

/// A discovered, not-yet-classified image reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub src: String,
    /// URL of the document the source was discovered in.
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Set for sources found via the document's own image elements; such a
    /// source is kept even when content-type sniffing cannot resolve it.
    #[serde(default)]
    pub verified: bool,
}

impl Candidate {
    pub fn new(src: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            page: page.into(),
            width: None,
            height: None,
            verified: false,
        }
    }
}

/// A candidate confirmed to be an image. `r#type` always starts with
/// `image/`; anything else is rejected during classification, not
/// represented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifiedImage {
    pub src: String,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub r#type: String,
    /// Declared content-length for network sources, the literal length of
    /// the source string for embedded data URLs.
    pub size: u64,
    #[serde(default)]
    pub disposition: String,
    /// Assigned by `downloader::names` before the image enters a save
    /// request.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Result of the headers-only metadata probe. An errored or timed-out probe
/// yields no meta at all, which callers treat as "no metadata" rather than
/// rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadMeta {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub disposition: String,
}

/// A finalized set of qualified images submitted for saving.
///
/// `filename` doubles as the path template: in zip mode it names the archive,
/// in individual mode its parent component is the directory each file is
/// saved under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub images: Vec<QualifiedImage>,
    pub zip: bool,
    pub filename: String,
    #[serde(default)]
    pub save_as: bool,
}
