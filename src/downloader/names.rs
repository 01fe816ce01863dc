use std::collections::HashMap;

use crate::core::model::QualifiedImage;

/// Assigns a unique filename to every image in the list, in order. Names
/// derive from the URL basename where one exists; duplicates get a numeric
/// suffix before the extension.
pub fn assign(images: &mut [QualifiedImage]) {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for img in images.iter_mut() {
        let name = derive(&img.src, &img.r#type);
        let n = seen.entry(name.to_ascii_lowercase()).or_insert(0);
        *n += 1;
        img.filename = Some(if *n == 1 { name } else { suffixed(&name, *n - 1) });
    }
}

/// Basename from the URL path with the query stripped; embedded data
/// sources have no path, so they name by type alone. A missing extension is
/// filled in from the resolved image type.
pub fn derive(src: &str, kind: &str) -> String {
    if src.starts_with("data:") {
        return format!("embedded.{}", extension_for(kind));
    }
    let tail = src
        .split('/')
        .next_back()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");
    let tail = if tail.is_empty() { "image" } else { tail };
    if tail.contains('.') && !tail.ends_with('.') {
        tail.to_string()
    } else {
        format!("{}.{}", tail.trim_end_matches('.'), extension_for(kind))
    }
}

fn suffixed(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
        None => format!("{name}-{n}"),
    }
}

fn extension_for(kind: &str) -> String {
    if kind.contains("jpeg") || kind.contains("jpg") {
        "jpg".to_string()
    } else if kind.contains("png") {
        "png".to_string()
    } else if kind.contains("gif") {
        "gif".to_string()
    } else if kind.contains("webp") {
        "webp".to_string()
    } else if kind.contains("bmp") {
        "bmp".to_string()
    } else {
        mime_guess::get_mime_extensions_str(kind)
            .and_then(|exts| exts.first())
            .unwrap_or(&"bin")
            .to_string()
    }
}
