use std::{path::Path, time::Duration};

use anyhow::Context;
use bytes::Bytes;
use uuid::Uuid;

use crate::state::AppState;

pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";
pub const PRESIGN_TTL: Duration = Duration::from_secs(10 * 60);

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub filename: Option<&'a str>,
    pub content_type: &'a str,
}

/// `uploads/recipe/<id>.<ext>`; the extension comes from the original file
/// name, then from the content type, then falls back to `bin`.
pub fn recipe_image_file_path_with(id: Uuid, filename: Option<&str>, content_type: &str) -> String {
    let ext = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
        .or_else(|| ext_from_mime(content_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());
    format!("{RECIPE_IMAGE_DIR}/{id}.{ext}")
}

pub fn recipe_image_file_path(filename: Option<&str>, content_type: &str) -> String {
    recipe_image_file_path_with(Uuid::new_v4(), filename, content_type)
}

/// Uploads the image under a fresh key and returns that key.
pub async fn store_recipe_image(st: &AppState, item: UploadItem<'_>) -> anyhow::Result<String> {
    anyhow::ensure!(!item.body.is_empty(), "empty image");
    let key = recipe_image_file_path(item.filename, item.content_type);
    st.storage
        .put_object(&key, item.body, item.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;
    Ok(key)
}

pub async fn presign_image(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, PRESIGN_TTL)
        .await
        .with_context(|| format!("presign url for {key}"))
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ext_from_known_mimes() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn recipe_image_path_uses_uuid_and_extension() {
        let id = Uuid::parse_str("6f1c2a8e-9d0b-4c1e-8a55-3b2f1e0d9c7a").unwrap();
        let path = recipe_image_file_path_with(id, Some("myfile.jpg"), "image/jpeg");
        assert_eq!(path, format!("uploads/recipe/{id}.jpg"));
    }

    #[test]
    fn recipe_image_path_falls_back_to_content_type() {
        let id = Uuid::nil();
        assert_eq!(
            recipe_image_file_path_with(id, Some("noext"), "image/png"),
            format!("uploads/recipe/{id}.png")
        );
        assert_eq!(
            recipe_image_file_path_with(id, None, "text/plain"),
            format!("uploads/recipe/{id}.bin")
        );
        assert_eq!(
            recipe_image_file_path_with(id, Some("Photo.JPEG"), "image/jpeg"),
            format!("uploads/recipe/{id}.jpeg")
        );
    }

    #[test]
    fn fresh_paths_differ() {
        let a = recipe_image_file_path(Some("a.jpg"), "image/jpeg");
        let b = recipe_image_file_path(Some("a.jpg"), "image/jpeg");
        assert!(a.starts_with("uploads/recipe/") && a.ends_with(".jpg"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn store_and_presign() {
        let state = AppState::fake();
        let key = store_recipe_image(
            &state,
            UploadItem {
                body: Bytes::from_static(b"\xff\xd8\xff"),
                filename: Some("steak.jpg"),
                content_type: "image/jpeg",
            },
        )
        .await
        .unwrap();
        assert!(key.starts_with("uploads/recipe/"));

        let url = presign_image(&state, &key).await.unwrap();
        assert!(url.contains(&key));
    }

    #[tokio::test]
    async fn store_rejects_empty_body() {
        let state = AppState::fake();
        let result = store_recipe_image(
            &state,
            UploadItem {
                body: Bytes::new(),
                filename: Some("empty.jpg"),
                content_type: "image/jpeg",
            },
        )
        .await;
        assert!(result.is_err());
    }
}
