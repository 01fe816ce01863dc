use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::GenericImageView;

/// Recovers pixel dimensions by actually decoding the image. Never fails:
/// anything that cannot be decoded measures `(0, 0)`. Terminal, no retry.
///
/// Only embedded `data:` sources carry their bytes with them; every other
/// scheme measures `(0, 0)` here, matching the probe's role of covering the
/// sources the metadata probe cannot size.
pub fn measure(src: &str) -> (u32, u32) {
    data_url_bytes(src)
        .and_then(|bytes| image::load_from_memory(&bytes).ok())
        .map(|img| img.dimensions())
        .unwrap_or((0, 0))
}

fn data_url_bytes(src: &str) -> Option<Vec<u8>> {
    let rest = src.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if header.ends_with(";base64") {
        STANDARD.decode(payload.trim()).ok()
    } else {
        Some(payload.as_bytes().to_vec())
    }
}
