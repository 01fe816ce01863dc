//! In-page image discovery: gathers candidate URLs from four sources,
//! deduplicates and filters them, classifies each through the type resolver
//! in bounded batches, and streams qualified images to the event sink.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use regex::Regex;
use scraper::Html;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::core::model::{Candidate, QualifiedImage};
use crate::error::Rejection;
use crate::events::{Event, EventSink};
use crate::net::Net;

pub mod batch;
pub mod extract;
pub mod probe;
pub mod resolve;

pub use batch::BATCH_WIDTH;

/// Compiles inclusion patterns, all or nothing: any invalid pattern disables
/// filtering entirely rather than silently filtering with a partial set.
pub fn compile_filters(specs: &[String]) -> Option<Vec<Regex>> {
    if specs.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(specs.len());
    for spec in specs {
        match Regex::new(spec) {
            Ok(re) => out.push(re),
            Err(e) => {
                warn!(pattern = spec.as_str(), error = %e, "invalid inclusion pattern, filtering disabled");
                return None;
            }
        }
    }
    Some(out)
}

/// One page-scan session. The dedup cache lives and dies with the collector:
/// a source URL is inspected at most once per scan no matter how many
/// discovery sources surface it.
pub struct Collector {
    net: Arc<dyn Net>,
    sink: Arc<dyn EventSink>,
    token: CancellationToken,
    deep: u8,
    filters: Option<Vec<Regex>>,
    cache: Mutex<HashSet<String>>,
}

impl Collector {
    pub fn new(
        net: Arc<dyn Net>,
        sink: Arc<dyn EventSink>,
        deep: u8,
        filters: Option<Vec<Regex>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            net,
            sink,
            token,
            deep,
            filters,
            cache: Mutex::new(HashSet::new()),
        }
    }

    /// Discovers, classifies, and progressively emits the page's images.
    /// Each completed top-level batch with at least one qualified image goes
    /// out as [`Event::Batch`] immediately.
    pub async fn run(&self, page: &Url, html: &str) {
        let images = self.cleanup(self.discover(page, html));
        self.sink.emit(Event::LinkCount {
            total: images.len(),
        });
        batch::process_batches(
            images,
            &self.token,
            |img| self.analyze(img),
            |images, index| {
                if !images.is_empty() {
                    self.sink.emit(Event::Batch { images, index });
                }
            },
        )
        .await;
    }

    /// Candidate discovery over the current page, four sources concatenated:
    /// image elements, `<source srcset>` entries, background images, and
    /// (when crawling) anchors plus bare URLs in the raw markup.
    fn discover(&self, page: &Url, html: &str) -> Vec<Candidate> {
        let doc = Html::parse_document(html);
        let page_str = page.as_str();

        let mut images = extract::images(&doc, page, page_str);
        for src in extract::srcset_urls(&doc) {
            images.push(Candidate::new(src, page_str));
        }
        for src in extract::background_urls(&doc, page.scheme()) {
            images.push(Candidate::new(src, page_str));
        }
        if self.deep > 0 {
            for src in extract::anchor_urls(&doc, page) {
                images.push(Candidate::new(src, page_str));
            }
            for src in raw_urls(html) {
                images.push(Candidate::new(src, page_str));
            }
        }
        images
    }

    /// Scheme filter, dedup, and inclusion patterns. The cache is marked
    /// before pattern filtering so even an excluded URL is never inspected
    /// twice.
    fn cleanup(&self, images: Vec<Candidate>) -> Vec<Candidate> {
        let mut cache = self.cache.lock().unwrap();
        let mut list = Vec::new();
        for img in images {
            let src = img.src.as_str();
            if !(src.starts_with("http") || src.starts_with("ftp") || src.starts_with("data:")) {
                continue;
            }
            if !cache.insert(img.src.clone()) {
                continue;
            }
            if let Some(filters) = &self.filters {
                if !filters.iter().any(|re| re.is_match(src)) {
                    continue;
                }
            }
            list.push(img);
        }
        list
    }

    /// Classifies one candidate; an HTML-typed candidate becomes its linked
    /// page's images when the configured depth allows expansion. Any other
    /// failure contributes nothing.
    async fn analyze(&self, img: Candidate) -> Vec<QualifiedImage> {
        match resolve::resolve(self.net.as_ref(), &img).await {
            Ok(q) => vec![q],
            Err(Rejection::Html) if self.deep > 1 => self.expand(img).await,
            Err(rejection) => {
                debug!(src = img.src.as_str(), %rejection, "candidate dropped");
                Vec::new()
            }
        }
    }

    /// One-hop expansion of an HTML-typed candidate: fetch it, extract its
    /// candidates (anchors too at depth 3), and classify them with the same
    /// batch discipline. Sub-candidates are never expanded further.
    async fn expand(&self, img: Candidate) -> Vec<QualifiedImage> {
        let mut sub = self.net.fetch_page(&img.src, self.deep == 3).await;
        for c in &mut sub {
            c.page = img.src.clone();
        }
        let sub = self.cleanup(sub);
        if sub.is_empty() {
            return Vec::new();
        }
        self.sink.emit(Event::LinkCount { total: sub.len() });

        let mut found = Vec::new();
        batch::process_batches(
            sub,
            &self.token,
            |c| self.classify(c),
            |images, _| found.extend(images),
        )
        .await;
        if self.token.is_cancelled() {
            Vec::new()
        } else {
            found
        }
    }

    /// Plain classification for sub-candidates of an expanded page; the
    /// expansion path is disabled so the crawl stays bounded at two hops.
    async fn classify(&self, img: Candidate) -> Vec<QualifiedImage> {
        match resolve::resolve(self.net.as_ref(), &img).await {
            Ok(q) => vec![q],
            Err(_) => Vec::new(),
        }
    }
}

/// Bare `http(s)/ftp/file` URLs scraped out of the raw markup, with HTML
/// entity `&amp;` decoded.
fn raw_urls(html: &str) -> Vec<String> {
    let re = Regex::new(
        r"(?i)\b(?:https?|ftp|file)://[-A-Z0-9+&@#/\\%?=~_|!:,.;]*[-A-Z0-9+&@#/\\%=~_|]",
    )
    .expect("regex");
    re.find_iter(html)
        .map(|m| m.as_str().replace("&amp;", "&"))
        .collect()
}
