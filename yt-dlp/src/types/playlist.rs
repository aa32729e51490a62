use serde::{Deserialize, Serialize};

/// One flat entry of a playlist as reported by `--flat-playlist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "_type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub playlist_count: Option<u32>,
    /// `None` when the URL resolved to a single item rather than a playlist.
    /// Unavailable entries are reported by yt-dlp as `null` placeholders.
    #[serde(default)]
    pub entries: Option<Vec<Option<PlaylistEntry>>>
}

impl PlaylistInfo {
    pub fn is_playlist(&self) -> bool {
        self.entries.is_some()
    }

    pub fn available_entries(&self) -> impl Iterator<Item = &PlaylistEntry> {
        self.entries.iter().flatten().flatten()
    }

    pub fn available_count(&self) -> usize {
        self.available_entries().count()
    }
}
