//! Application constants

/// GCS bucket name for uploaded media
pub const BUCKET_NAME: &str = "mediacast_media_data";

/// Maximum upload size for media files (200 MB)
pub const MAX_MEDIA_UPLOAD_SIZE: usize = 200 * 1024 * 1024;

/// Signed URL expiry time in seconds (15 minutes)
pub const SIGNED_URL_EXPIRY_SECS: u32 = 15 * 60;

/// Milliseconds per display-slot minute
pub const SLOT_MINUTE_MS: i64 = 60_000;

/// Capacity of each notification topic's broadcast channel
pub const SYNC_CHANNEL_CAPACITY: usize = 64;

/// How often the upkeep task purges expired refresh tokens (seconds)
pub const TOKEN_CLEANUP_INTERVAL_SECS: u64 = 15 * 60;
