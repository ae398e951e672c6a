use std::borrow::Borrow;
use std::cmp::Ordering;

use common::{Album, AlbumArtist, Artist, Genre, Song};

/// A per-kind sort key. `Custom` keys keep the caller's order.
pub trait SortBy<T>: Copy {
    fn is_custom(self) -> bool;
    fn compare(self, a: &T, b: &T) -> Ordering;
}

/// Stable sort over a snapshot. `reversed` flips the sorted sequence, not the
/// comparator, so the result is always the exact reverse of the forward order.
pub fn sort<T, E, S>(items: &[E], by: S, reversed: bool) -> Vec<E>
where
    E: Borrow<T> + Clone,
    S: SortBy<T>,
{
    let mut sorted = items.to_vec();
    if !by.is_custom() {
        sorted.sort_by(|a, b| by.compare(a.borrow(), b.borrow()));
    }
    if reversed {
        sorted.reverse();
    }
    sorted
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn cmp_opt_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp_text(a, b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SongSortBy {
    Custom,
    Title,
    Artist,
    Album,
    Duration,
    DateAdded,
    DateModified,
    Composer,
    AlbumArtist,
    Year,
    Filename,
    TrackNumber,
}

impl SongSortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "custom" => Some(Self::Custom),
            "title" => Some(Self::Title),
            "artist" => Some(Self::Artist),
            "album" => Some(Self::Album),
            "duration" => Some(Self::Duration),
            "date_added" | "added" => Some(Self::DateAdded),
            "date_modified" | "modified" => Some(Self::DateModified),
            "composer" => Some(Self::Composer),
            "album_artist" => Some(Self::AlbumArtist),
            "year" => Some(Self::Year),
            "filename" => Some(Self::Filename),
            "track_number" | "track" => Some(Self::TrackNumber),
            _ => None,
        }
    }
}

impl SortBy<Song> for SongSortBy {
    fn is_custom(self) -> bool {
        self == Self::Custom
    }

    fn compare(self, a: &Song, b: &Song) -> Ordering {
        match self {
            Self::Custom => Ordering::Equal,
            Self::Title => cmp_text(&a.title, &b.title),
            Self::Artist => cmp_opt_text(a.artist_name.as_deref(), b.artist_name.as_deref()),
            Self::Album => cmp_opt_text(a.album_name.as_deref(), b.album_name.as_deref()),
            Self::Duration => a.duration_ms.cmp(&b.duration_ms),
            Self::DateAdded => a.date_added.cmp(&b.date_added),
            Self::DateModified => a.date_modified.cmp(&b.date_modified),
            Self::Composer => cmp_opt_text(a.composer.as_deref(), b.composer.as_deref()),
            Self::AlbumArtist => cmp_opt_text(
                a.additional.album_artist.as_deref(),
                b.additional.album_artist.as_deref(),
            ),
            Self::Year => a.year.cmp(&b.year),
            Self::Filename => cmp_text(&a.filename, &b.filename),
            Self::TrackNumber => a.track_number.cmp(&b.track_number),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlbumArtistSortBy {
    Custom,
    ArtistName,
    TracksCount,
    AlbumsCount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtistSortBy {
    Custom,
    ArtistName,
    TracksCount,
    AlbumsCount,
}

impl AlbumArtistSortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "custom" => Some(Self::Custom),
            "name" | "artist_name" => Some(Self::ArtistName),
            "tracks" | "tracks_count" => Some(Self::TracksCount),
            "albums" | "albums_count" => Some(Self::AlbumsCount),
            _ => None,
        }
    }
}

impl ArtistSortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "custom" => Some(Self::Custom),
            "name" | "artist_name" => Some(Self::ArtistName),
            "tracks" | "tracks_count" => Some(Self::TracksCount),
            "albums" | "albums_count" => Some(Self::AlbumsCount),
            _ => None,
        }
    }
}

impl SortBy<AlbumArtist> for AlbumArtistSortBy {
    fn is_custom(self) -> bool {
        self == Self::Custom
    }

    fn compare(self, a: &AlbumArtist, b: &AlbumArtist) -> Ordering {
        match self {
            Self::Custom => Ordering::Equal,
            Self::ArtistName => cmp_text(&a.name, &b.name),
            Self::TracksCount => a.number_of_tracks.cmp(&b.number_of_tracks),
            Self::AlbumsCount => a.number_of_albums.cmp(&b.number_of_albums),
        }
    }
}

impl SortBy<Artist> for ArtistSortBy {
    fn is_custom(self) -> bool {
        self == Self::Custom
    }

    fn compare(self, a: &Artist, b: &Artist) -> Ordering {
        match self {
            Self::Custom => Ordering::Equal,
            Self::ArtistName => cmp_text(&a.name, &b.name),
            Self::TracksCount => a.number_of_tracks.cmp(&b.number_of_tracks),
            Self::AlbumsCount => a.number_of_albums.cmp(&b.number_of_albums),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlbumSortBy {
    Custom,
    AlbumName,
    ArtistName,
    Year,
    TracksCount,
}

impl AlbumSortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "custom" => Some(Self::Custom),
            "name" | "album_name" => Some(Self::AlbumName),
            "artist" | "artist_name" => Some(Self::ArtistName),
            "year" => Some(Self::Year),
            "tracks" | "tracks_count" => Some(Self::TracksCount),
            _ => None,
        }
    }
}

fn album_artist_label(album: &Album) -> Option<&str> {
    album
        .album_artist
        .as_deref()
        .or_else(|| album.artists.iter().next().map(String::as_str))
}

impl SortBy<Album> for AlbumSortBy {
    fn is_custom(self) -> bool {
        self == Self::Custom
    }

    fn compare(self, a: &Album, b: &Album) -> Ordering {
        match self {
            Self::Custom => Ordering::Equal,
            Self::AlbumName => cmp_text(&a.name, &b.name),
            Self::ArtistName => cmp_opt_text(album_artist_label(a), album_artist_label(b)),
            Self::Year => a.start_year.cmp(&b.start_year),
            Self::TracksCount => a.number_of_tracks.cmp(&b.number_of_tracks),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenreSortBy {
    Custom,
    Genre,
    TracksCount,
}

impl GenreSortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "custom" => Some(Self::Custom),
            "name" | "genre" => Some(Self::Genre),
            "tracks" | "tracks_count" => Some(Self::TracksCount),
            _ => None,
        }
    }
}

impl SortBy<Genre> for GenreSortBy {
    fn is_custom(self) -> bool {
        self == Self::Custom
    }

    fn compare(self, a: &Genre, b: &Genre) -> Ordering {
        match self {
            Self::Custom => Ordering::Equal,
            Self::Genre => cmp_text(&a.name, &b.name),
            Self::TracksCount => a.number_of_tracks.cmp(&b.number_of_tracks),
        }
    }
}
