use common::{Album, AlbumArtist, AlbumId, Artist, Genre, Song};

use crate::repository::{GroupedRepository, Grouping, Members};
use crate::search::{FuzzySearchOption, FuzzySearcher};
use crate::sort::{AlbumArtistSortBy, AlbumSortBy, ArtistSortBy, GenreSortBy};

pub type AlbumArtistRepository = GroupedRepository<AlbumArtistGrouping>;
pub type ArtistRepository = GroupedRepository<ArtistGrouping>;
pub type AlbumRepository = GroupedRepository<AlbumGrouping>;
pub type GenreRepository = GroupedRepository<GenreGrouping>;

fn named_key(value: Option<&String>) -> Vec<String> {
    value
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| vec![name.to_string()])
        .unwrap_or_default()
}

/// The album a song is filed under, if the album grouping accepts it.
/// Every album-id index goes through this so counts and joins agree.
pub(crate) fn album_key(song: &Song) -> Option<AlbumId> {
    match song.album_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(song.album_id),
        _ => None,
    }
}

pub struct AlbumArtistGrouping;

impl Grouping for AlbumArtistGrouping {
    type Key = String;
    type Entity = AlbumArtist;
    type SortKey = AlbumArtistSortBy;

    const KIND: &'static str = "album-artist";

    fn keys(song: &Song) -> Vec<String> {
        named_key(song.additional.album_artist.as_ref())
    }

    fn aggregate(key: &String, _: &Song, _: Option<&AlbumArtist>, members: Members) -> AlbumArtist {
        AlbumArtist {
            name: key.clone(),
            number_of_albums: members.albums,
            number_of_tracks: members.tracks,
        }
    }

    fn searcher() -> FuzzySearcher<AlbumArtist> {
        FuzzySearcher::new(vec![FuzzySearchOption::new(album_artist_name)])
    }
}

fn album_artist_name(artist: &AlbumArtist) -> Option<&str> {
    Some(&artist.name)
}

pub struct ArtistGrouping;

impl Grouping for ArtistGrouping {
    type Key = String;
    type Entity = Artist;
    type SortKey = ArtistSortBy;

    const KIND: &'static str = "artist";

    fn keys(song: &Song) -> Vec<String> {
        named_key(song.artist_name.as_ref())
    }

    fn aggregate(key: &String, _: &Song, _: Option<&Artist>, members: Members) -> Artist {
        Artist {
            name: key.clone(),
            number_of_albums: members.albums,
            number_of_tracks: members.tracks,
        }
    }

    fn searcher() -> FuzzySearcher<Artist> {
        FuzzySearcher::new(vec![FuzzySearchOption::new(artist_name)])
    }
}

fn artist_name(artist: &Artist) -> Option<&str> {
    Some(&artist.name)
}

pub struct AlbumGrouping;

impl Grouping for AlbumGrouping {
    type Key = AlbumId;
    type Entity = Album;
    type SortKey = AlbumSortBy;

    const KIND: &'static str = "album";

    fn keys(song: &Song) -> Vec<AlbumId> {
        album_key(song).into_iter().collect()
    }

    fn aggregate(key: &AlbumId, song: &Song, existing: Option<&Album>, members: Members) -> Album {
        let name = song.album_name.as_deref().unwrap_or_default().trim().to_string();
        let mut album = match existing {
            Some(existing) => existing.clone(),
            None => Album {
                id: *key,
                name: name.clone(),
                artists: Default::default(),
                album_artist: None,
                start_year: None,
                end_year: None,
                number_of_tracks: 0,
            },
        };
        // min/union merges keep the record independent of arrival order
        if name < album.name {
            album.name = name;
        }
        if let Some(artist) = song.artist_name.as_deref().map(str::trim) {
            if !artist.is_empty() {
                album.artists.insert(artist.to_string());
            }
        }
        if let Some(album_artist) = song.additional.album_artist.as_deref().map(str::trim) {
            let replace = match album.album_artist.as_deref() {
                Some(current) => album_artist < current,
                None => !album_artist.is_empty(),
            };
            if replace && !album_artist.is_empty() {
                album.album_artist = Some(album_artist.to_string());
            }
        }
        if let Some(year) = song.year {
            album.start_year = Some(album.start_year.map_or(year, |y| y.min(year)));
            album.end_year = Some(album.end_year.map_or(year, |y| y.max(year)));
        }
        album.number_of_tracks = members.tracks;
        album
    }

    fn searcher() -> FuzzySearcher<Album> {
        FuzzySearcher::new(vec![
            FuzzySearchOption::weighted(album_name, 3),
            FuzzySearchOption::any_of(album_artists),
            FuzzySearchOption::new(album_album_artist),
        ])
    }
}

fn album_name(album: &Album) -> Option<&str> {
    Some(&album.name)
}

fn album_artists(album: &Album) -> Vec<&str> {
    album.artists.iter().map(String::as_str).collect()
}

fn album_album_artist(album: &Album) -> Option<&str> {
    album.album_artist.as_deref()
}

pub struct GenreGrouping;

impl Grouping for GenreGrouping {
    type Key = String;
    type Entity = Genre;
    type SortKey = GenreSortBy;

    const KIND: &'static str = "genre";

    fn keys(song: &Song) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for genre in &song.additional.genres {
            let genre = genre.trim();
            if !genre.is_empty() && !keys.iter().any(|k| k == genre) {
                keys.push(genre.to_string());
            }
        }
        keys
    }

    fn aggregate(key: &String, _: &Song, _: Option<&Genre>, members: Members) -> Genre {
        Genre {
            name: key.clone(),
            number_of_tracks: members.tracks,
        }
    }

    fn searcher() -> FuzzySearcher<Genre> {
        FuzzySearcher::new(vec![FuzzySearchOption::new(genre_name)])
    }
}

fn genre_name(genre: &Genre) -> Option<&str> {
    Some(&genre.name)
}
