use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::{relpath_from, stable_u64, Song, SongAdditional};
use groove::{GrooveConfig, MediaFeed};
use metadata::{read_tags, TagInfo};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub tag_errors: usize,
}

/// Walks `root` and drives one full scan cycle through `feed`.
pub fn scan_directory(root: &Path, config: &GrooveConfig, feed: &MediaFeed) -> ScanStats {
    let files = collect_audio_files(root, config);
    info!("Found {} audio files under {}", files.len(), root.display());

    let mut stats = ScanStats::default();
    let generation = feed.start_scan();
    for file in files {
        let relpath = match relpath_from(root, &file) {
            Some(rel) => rel,
            None => continue,
        };
        let tag = match read_tags(&file) {
            Ok(tag) => tag,
            Err(err) => {
                warn!("Failed to read tags for {:?}: {}", file, err);
                stats.tag_errors += 1;
                TagInfo::default()
            }
        };
        let song = song_from_tags(root, &file, &relpath, tag);
        feed.emit_song(generation, Arc::new(song));
        stats.files += 1;
    }
    feed.end_scan(generation);
    stats
}

fn collect_audio_files(root: &Path, config: &GrooveConfig) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| config.is_audio_extension(ext))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub fn song_from_tags(root: &Path, file: &Path, relpath: &str, tag: TagInfo) -> Song {
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| relpath.to_string());
    let album_dir = album_dir_of(file);
    // Loose files directly under the root each stand as their own album.
    let album_relpath = album_dir
        .as_deref()
        .and_then(|dir| relpath_from(root, dir))
        .filter(|rel| !rel.is_empty())
        .unwrap_or_else(|| relpath.to_string());
    let folder_album = album_dir
        .as_deref()
        .filter(|dir| *dir != root)
        .and_then(|dir| dir.file_name())
        .map(|name| split_title_year(&name.to_string_lossy()));
    let folder_artist = album_dir
        .as_deref()
        .filter(|dir| *dir != root)
        .and_then(Path::parent)
        .filter(|dir| *dir != root && dir.starts_with(root))
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().to_string());

    let artist_name = tag.artist.clone().or_else(|| folder_artist.clone());
    let album_name = tag
        .album
        .clone()
        .or_else(|| folder_album.as_ref().map(|(title, _)| title.clone()));
    let year = tag
        .year
        .or_else(|| folder_album.as_ref().and_then(|(_, year)| *year));
    let disc_number = tag.disc_no.or_else(|| disc_number_from_path(file));
    let (date_added, date_modified) = file_times(file);
    let title = tag.title.clone().unwrap_or_else(|| file_stem(file));

    debug!("Indexed {} as {:?} / {:?}", relpath, artist_name, album_name);
    Song {
        id: stable_u64(relpath),
        title,
        filename,
        path: relpath.to_string(),
        duration_ms: tag.duration_ms.unwrap_or(0),
        date_added,
        date_modified,
        composer: tag.composer,
        year,
        track_number: tag.track_no,
        artist_name,
        album_name,
        album_id: stable_u64(&album_relpath),
        additional: SongAdditional {
            album_artist: tag.album_artist.or(folder_artist),
            genres: tag.genres,
            disc_number,
        },
    }
}

/// Disc folders (`CD1`, `Disc 2`) belong to the album folder above them.
fn album_dir_of(file: &Path) -> Option<PathBuf> {
    let parent = file.parent()?;
    let is_disc = parent
        .file_name()
        .and_then(|name| name.to_str())
        .map(is_disc_folder_name)
        .unwrap_or(false);
    if is_disc {
        parent.parent().map(Path::to_path_buf)
    } else {
        Some(parent.to_path_buf())
    }
}

fn is_disc_folder_name(name: &str) -> bool {
    disc_number_from_name(name).is_some()
}

fn disc_number_from_name(name: &str) -> Option<u16> {
    let lower = name.trim().to_ascii_lowercase();
    let rest = ["disc", "disk", "cd"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))?;
    let digits = rest.trim_start_matches([' ', '_', '-', '.']);
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn disc_number_from_path(file: &Path) -> Option<u16> {
    file.parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .and_then(disc_number_from_name)
}

/// Splits `Title (1999)` or `1999 - Title` folder names.
fn split_title_year(name: &str) -> (String, Option<i32>) {
    let trimmed = name.trim();
    if let Some(open) = trimmed.rfind('(') {
        if let Some(inner) = trimmed[open + 1..].strip_suffix(')') {
            if let Some(year) = parse_year(inner) {
                return (trimmed[..open].trim().to_string(), Some(year));
            }
        }
    }
    if let Some((head, tail)) = trimmed.split_once(" - ") {
        if let Some(year) = parse_year(head) {
            return (tail.trim().to_string(), Some(year));
        }
    }
    (trimmed.to_string(), None)
}

fn parse_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if value.len() != 4 || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn file_times(path: &Path) -> (u64, u64) {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return (0, 0),
    };
    let modified = meta.modified().map(to_secs).unwrap_or(0);
    let created = meta.created().map(to_secs).unwrap_or(modified);
    (created, modified)
}

fn to_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
