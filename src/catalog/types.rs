use auraflix_media::AssetPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(Uuid);

impl MovieId {
    /// Generate a new random movie ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MovieId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MovieId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<MovieId> for Uuid {
    fn from(id: MovieId) -> Self {
        id.0
    }
}

impl std::str::FromStr for MovieId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored movie.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub description: Option<String>,
    pub genre_id: Option<i64>,
    pub language: Option<String>,
    /// Running time in minutes.
    pub duration: Option<u32>,
    pub release_date: Option<DateTime<Utc>>,
    /// Video path relative to the media root.
    pub file_path: String,
    /// Poster path relative to the media root.
    pub poster_path: Option<String>,
    pub video_content_type: String,
    pub poster_content_type: Option<String>,
    pub size_bytes: u64,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Movie {
    /// Parsed video path, `None` if the stored value is unsafe.
    pub fn video_asset(&self) -> Option<AssetPath> {
        AssetPath::parse(&self.file_path)
    }

    /// Parsed poster path.
    pub fn poster_asset(&self) -> Option<AssetPath> {
        self.poster_path.as_deref().and_then(AssetPath::parse)
    }
}

/// Fields for a record about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub title: String,
    pub description: Option<String>,
    pub genre_id: Option<i64>,
    pub language: Option<String>,
    pub duration: Option<u32>,
    pub release_date: Option<DateTime<Utc>>,
    pub file_path: String,
    pub poster_path: Option<String>,
    pub video_content_type: String,
    pub poster_content_type: Option<String>,
    pub size_bytes: u64,
}

impl NewMovie {
    /// A record with only the required fields set.
    pub fn new(
        title: impl Into<String>,
        file_path: impl Into<String>,
        video_content_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            genre_id: None,
            language: None,
            duration: None,
            release_date: None,
            file_path: file_path.into(),
            poster_path: None,
            video_content_type: video_content_type.into(),
            poster_content_type: None,
            size_bytes,
        }
    }
}
