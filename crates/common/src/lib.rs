use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub type SongId = u64;
pub type AlbumId = u64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub filename: String,
    pub path: String,
    pub duration_ms: u32,
    pub date_added: u64,
    pub date_modified: u64,
    #[serde(default)]
    pub composer: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub track_number: Option<u16>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    pub album_id: AlbumId,
    #[serde(default)]
    pub additional: SongAdditional,
}

/// Tag fields that only some repositories group by.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongAdditional {
    #[serde(default)]
    pub album_artist: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub disc_number: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumArtist {
    pub name: String,
    pub number_of_albums: usize,
    pub number_of_tracks: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    pub number_of_albums: usize,
    pub number_of_tracks: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    #[serde(default)]
    pub artists: BTreeSet<String>,
    #[serde(default)]
    pub album_artist: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub number_of_tracks: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub name: String,
    pub number_of_tracks: usize,
}

/// Numeric id derived from the first eight bytes of the blake3 digest.
pub fn stable_u64(input: &str) -> u64 {
    let hash = blake3::hash(input.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
