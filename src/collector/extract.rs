use scraper::{Html, Selector};
use url::Url;

use crate::core::model::Candidate;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Enumerates a fetched document's candidates: its image elements always,
/// its qualifying anchors when `include_links` is set. Pure over the parsed
/// document; fetch failures are the caller's concern.
pub fn extract(html: &str, base: &Url, include_links: bool) -> Vec<Candidate> {
    let doc = Html::parse_document(html);
    let mut out = images(&doc, base, base.as_str());
    if include_links {
        out.extend(
            anchor_urls(&doc, base)
                .into_iter()
                .filter(|s| s.starts_with("http") || s.starts_with("ftp") || s.starts_with("data:"))
                .map(|src| Candidate::new(src, base.as_str())),
        );
    }
    out
}

/// `<img>` elements with their declared dimensions. These are verified:
/// the document itself claims they are images.
pub(crate) fn images(doc: &Html, base: &Url, page: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    for el in doc.select(&selector("img")) {
        let Some(src) = el.value().attr("src") else {
            continue;
        };
        let Ok(resolved) = base.join(src) else {
            continue;
        };
        out.push(Candidate {
            src: resolved.to_string(),
            page: page.to_string(),
            width: el.value().attr("width").and_then(|w| w.parse().ok()),
            height: el.value().attr("height").and_then(|h| h.parse().ok()),
            verified: true,
        });
    }
    out
}

/// Resolved hrefs of every anchor, in document order.
pub(crate) fn anchor_urls(doc: &Html, base: &Url) -> Vec<String> {
    doc.select(&selector("a"))
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|u| u.to_string())
        .collect()
}

/// The first URL of every `<source srcset>`. Taken verbatim from the
/// attribute: a relative srcset carries no scheme and dies in cleanup.
pub(crate) fn srcset_urls(doc: &Html) -> Vec<String> {
    doc.select(&selector("source"))
        .filter_map(|el| el.value().attr("srcset"))
        .filter_map(|srcset| srcset.split(' ').next())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Background image URLs parsed out of `url(...)` in inline `style`
/// attributes and `<style>` blocks. Protocol-relative sources are rewritten
/// to the page scheme; root-relative ones are left unresolved and carry no
/// scheme, so cleanup drops them.
pub(crate) fn background_urls(doc: &Html, scheme: &str) -> Vec<String> {
    let url_re = regex::Regex::new(r#"url\(\s*['"]?([^'")]+)['"]?\s*\)"#).expect("regex");
    let mut styles: Vec<String> = doc
        .select(&selector("[style]"))
        .filter_map(|el| el.value().attr("style"))
        .filter(|s| s.contains("background"))
        .map(str::to_string)
        .collect();
    styles.extend(doc.select(&selector("style")).map(|el| el.text().collect::<String>()));

    let mut out = Vec::new();
    for style in &styles {
        for cap in url_re.captures_iter(style) {
            let src = &cap[1];
            if let Some(rest) = src.strip_prefix("//") {
                out.push(format!("{scheme}://{rest}"));
            } else {
                out.push(src.to_string());
            }
        }
    }
    out
}
