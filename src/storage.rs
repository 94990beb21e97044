//! Shared storage helpers for uploading/downloading media blobs.
//!
//! The core never mutates a stored blob; it only writes new objects at
//! upload time and records the returned path on the media row. Supports
//! a local-disk backend (`LOCAL_STORAGE_PATH`) and GCS, tried in that
//! order.

use bytes::Bytes;
use std::path::PathBuf;

/// Download a stored media blob from local storage or GCS.
pub async fn download_blob(
    gcs: Option<&google_cloud_storage::client::Storage>,
    local_storage_path: Option<&PathBuf>,
    bucket_name: &str,
    blob_path: &str,
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(local_path) = local_storage_path {
        let full_path = local_path.join(blob_path);
        Ok(tokio::fs::read(&full_path).await?)
    } else if let Some(gcs) = gcs {
        let bucket = format!("projects/_/buckets/{}", bucket_name);
        let mut resp = gcs.read_object(&bucket, blob_path).send().await?;
        let mut data = Vec::new();
        while let Some(chunk) = resp.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    } else {
        Err("No storage backend configured (set LOCAL_STORAGE_PATH or GOOGLE_APPLICATION_CREDENTIALS)".into())
    }
}

/// Upload a media blob to local storage or GCS.
pub async fn upload_blob(
    gcs: Option<&google_cloud_storage::client::Storage>,
    local_storage_path: Option<&PathBuf>,
    bucket_name: &str,
    blob_path: &str,
    data: &[u8],
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(local_path) = local_storage_path {
        let full_path = local_path.join(blob_path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, data).await?;
    } else if let Some(gcs) = gcs {
        let bucket = format!("projects/_/buckets/{}", bucket_name);
        let bytes = Bytes::copy_from_slice(data);
        gcs.write_object(&bucket, blob_path, bytes)
            .send_buffered()
            .await?;
    } else {
        return Err("No storage backend configured".into());
    }
    Ok(())
}

/// Sniff a content type from a blob path's extension (for serving).
pub fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".mp4") {
        "video/mp4"
    } else if path.ends_with(".webm") {
        "video/webm"
    } else if path.ends_with(".mov") {
        "video/quicktime"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".mp3") {
        "audio/mpeg"
    } else if path.ends_with(".ogg") {
        "audio/ogg"
    } else if path.ends_with(".wav") {
        "audio/wav"
    } else if path.ends_with(".aac") {
        "audio/aac"
    } else {
        "application/octet-stream"
    }
}

/// Map a content type to the extension used in blob paths.
pub fn get_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/aac" => "aac",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(get_extension("image/png"), "png");
        assert_eq!(get_extension("video/mp4"), "mp4");
        assert_eq!(get_extension("audio/mpeg"), "mp3");
        assert_eq!(get_extension("application/octet-stream"), "bin");
    }

    #[test]
    fn test_content_type_sniffing() {
        assert_eq!(
            content_type_for("image/user_1/2026-08-06/1.png"),
            "image/png"
        );
        assert_eq!(content_type_for("video/user_1/2026-08-06/1.mp4"), "video/mp4");
        assert_eq!(content_type_for("audio/user_1/2026-08-06/1.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("x.unknown"), "application/octet-stream");
    }
}
