use crate::collector::probe;
use crate::core::model::{Candidate, QualifiedImage};
use crate::error::Rejection;
use crate::net::Net;

/// Extension overrides in priority order. A match wins over whatever type
/// the probe declared.
const OVERRIDES: [(&str, &str); 5] = [
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".bmp", "image/bmp"),
    (".gif", "image/gif"),
];

/// Classifies a candidate through the metadata probe.
///
/// The declared type resolving to `text/html` is reported as
/// [`Rejection::Html`] so the caller can attempt page expansion instead of
/// dropping the candidate outright. A failed probe is "no metadata": the
/// extension overrides and the verified-image fallback still apply.
pub async fn resolve<N: Net + ?Sized>(
    net: &N,
    img: &Candidate,
) -> Result<QualifiedImage, Rejection> {
    let meta = net.head(&img.src).await.unwrap_or_default();
    let mut kind = meta.r#type;
    if kind.starts_with("text/html") {
        return Err(Rejection::Html);
    }
    if let Some(forced) = extension_override(&img.src) {
        kind = forced.to_string();
    }
    // the page itself presented this source as an image; keep it even
    // though its type cannot be resolved
    if kind.is_empty() && img.verified {
        kind = "image/unknown".to_string();
    }
    if !kind.starts_with("image/") {
        return Err(Rejection::NotAnImage(kind));
    }

    // data sources cannot be measured over the wire
    let size = if img.src.starts_with("http") {
        meta.size.unwrap_or(0)
    } else {
        img.src.len() as u64
    };
    let (mut width, mut height) = (img.width, img.height);
    if !img.src.starts_with("http") && (width.is_none() || height.is_none()) {
        let (w, h) = probe::measure(&img.src);
        width = Some(w);
        height = Some(h);
    }

    Ok(QualifiedImage {
        src: img.src.clone(),
        page: img.page.clone(),
        width,
        height,
        r#type: kind,
        size,
        disposition: meta.disposition,
        filename: None,
    })
}

fn extension_override(src: &str) -> Option<&'static str> {
    for (ext, kind) in OVERRIDES {
        if src.ends_with(ext) || src.contains(&format!("{ext}?")) {
            return Some(kind);
        }
    }
    None
}
