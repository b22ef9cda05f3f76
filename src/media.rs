//! Recipe image storage.
//!
//! Uploads arrive as base64 data URIs inside the JSON payload, get
//! decoded and written under the media root, and are served back below
//! the `/media/` URL prefix.

use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

use crate::errors::MediaError;

/// Subdirectory of the media root that recipe images land in.
const IMAGE_DIR: &str = "recipes/image";

/// URL for a stored media-relative path.
pub fn media_url(relative: &str) -> String {
    format!("/media/{}", relative)
}

/// Decode a `data:image/...;base64,...` payload (or bare base64, assumed
/// PNG) into bytes plus a file extension.
pub fn decode_data_uri(payload: &str) -> Result<(Vec<u8>, &'static str), MediaError> {
    let (ext, encoded) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (mime, data) = rest
                .split_once(";base64,")
                .ok_or_else(|| MediaError::InvalidPayload("missing base64 marker".into()))?;
            let ext = match mime {
                "image/png" => "png",
                "image/jpeg" | "image/jpg" => "jpg",
                "image/gif" => "gif",
                "image/webp" => "webp",
                other => return Err(MediaError::UnsupportedType(other.to_string())),
            };
            (ext, data)
        }
        None => ("png", payload),
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| MediaError::InvalidPayload(e.to_string()))?;
    if bytes.is_empty() {
        return Err(MediaError::InvalidPayload("empty image".into()));
    }
    Ok((bytes, ext))
}

/// Decode and persist an uploaded image; returns the media-relative path
/// stored on the recipe row.
pub fn save_image(media_root: &Path, payload: &str) -> Result<String, MediaError> {
    let (bytes, ext) = decode_data_uri(payload)?;
    let dir = media_root.join(IMAGE_DIR);
    std::fs::create_dir_all(&dir)?;
    let filename = format!("{}.{}", Uuid::new_v4().simple(), ext);
    std::fs::write(dir.join(&filename), bytes)?;
    Ok(format!("{}/{}", IMAGE_DIR, filename))
}

/// Resolve a requested media path against the root, rejecting any
/// component that would escape it.
pub fn resolve_media_path(media_root: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    for component in requested.components() {
        match component {
            Component::Normal(_) => {}
            _ => return None,
        }
    }
    Some(media_root.join(requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // 1x1 transparent PNG.
    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn decode_accepts_data_uri() {
        let payload = format!("data:image/png;base64,{}", TINY_PNG);
        let (bytes, ext) = decode_data_uri(&payload).unwrap();
        assert_eq!(ext, "png");
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn decode_accepts_bare_base64_as_png() {
        let (bytes, ext) = decode_data_uri(TINY_PNG).unwrap();
        assert_eq!(ext, "png");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn decode_rejects_unknown_mime_and_bad_base64() {
        let err = decode_data_uri("data:application/pdf;base64,AAAA").unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedType(_)));

        let err = decode_data_uri("data:image/png;base64,!!notbase64!!").unwrap_err();
        assert!(matches!(err, MediaError::InvalidPayload(_)));
    }

    #[test]
    fn save_image_writes_below_media_root() {
        let root = TempDir::new().unwrap();
        let payload = format!("data:image/jpeg;base64,{}", TINY_PNG);
        let relative = save_image(root.path(), &payload).unwrap();
        assert!(relative.starts_with("recipes/image/"));
        assert!(relative.ends_with(".jpg"));
        assert!(root.path().join(&relative).exists());
        assert_eq!(media_url(&relative), format!("/media/{}", relative));
    }

    #[test]
    fn resolve_rejects_path_traversal() {
        let root = Path::new("/srv/media");
        assert!(resolve_media_path(root, "recipes/image/a.png").is_some());
        assert!(resolve_media_path(root, "../secrets.txt").is_none());
        assert!(resolve_media_path(root, "recipes/../../etc/passwd").is_none());
        assert!(resolve_media_path(root, "/etc/passwd").is_none());
    }
}
