use auraflix_media::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_VIDEO_BYTES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Directory holding `videos/` and `posters/`
    #[serde(default = "default_media_root")]
    pub root: PathBuf,

    /// Largest accepted video upload in bytes (default: 1 GiB)
    #[serde(default = "default_max_video_upload_bytes")]
    pub max_video_upload_bytes: u64,

    /// Read/write chunk size in bytes (default: 1 MiB)
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("./media")
}
fn default_max_video_upload_bytes() -> u64 {
    DEFAULT_MAX_VIDEO_BYTES
}
fn default_chunk_size_bytes() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            max_video_upload_bytes: default_max_video_upload_bytes(),
            chunk_size_bytes: default_chunk_size_bytes(),
        }
    }
}
