pub mod config;
pub mod error;
pub mod events;
pub mod explorer;
pub mod feed;
pub mod groupings;
pub mod repository;
pub mod search;
pub mod song;
pub mod sort;

use std::sync::Arc;

use common::{Album, AlbumId, Song};
use tokio::runtime::Handle;
use tracing::info;

pub use config::{ConfigError, GrooveConfig};
pub use error::GrooveError;
pub use events::{EventBus, RapidUpdateDispatcher, SubscriptionHandle};
pub use explorer::{ExplorerEntry, ExplorerNode, ExplorerPath, GrooveExplorer};
pub use feed::{MediaEvent, MediaFeed, ScanGeneration};
pub use groupings::{AlbumArtistRepository, AlbumRepository, ArtistRepository, GenreRepository};
pub use repository::{GroupedRepository, Grouping, RepositorySignals};
pub use search::{FuzzyResult, FuzzySearcher, SubListNonStrict};
pub use song::SongRepository;
pub use sort::{AlbumArtistSortBy, AlbumSortBy, ArtistSortBy, GenreSortBy, SongSortBy};

/// Owns one repository per entity kind and wires them to a media feed.
pub struct Groove {
    pub songs: Arc<SongRepository>,
    pub albums: Arc<AlbumRepository>,
    pub artists: Arc<ArtistRepository>,
    pub album_artists: Arc<AlbumArtistRepository>,
    pub genres: Arc<GenreRepository>,
    search_limit: usize,
}

impl Groove {
    pub fn new(config: &GrooveConfig, runtime: Handle) -> Self {
        let window = config.coalesce_window();
        Self {
            songs: Arc::new(SongRepository::new(window, runtime.clone())),
            albums: Arc::new(AlbumRepository::new(window, runtime.clone())),
            artists: Arc::new(ArtistRepository::new(window, runtime.clone())),
            album_artists: Arc::new(AlbumArtistRepository::new(window, runtime.clone())),
            genres: Arc::new(GenreRepository::new(window, runtime)),
            search_limit: config.search_limit,
        }
    }

    /// Subscribes every repository to `feed`. Songs are indexed first so the
    /// grouped repositories can always resolve their members.
    pub fn ready(&self, feed: &MediaFeed) -> Vec<SubscriptionHandle> {
        let songs = Arc::clone(&self.songs);
        let albums = Arc::clone(&self.albums);
        let artists = Arc::clone(&self.artists);
        let album_artists = Arc::clone(&self.album_artists);
        let genres = Arc::clone(&self.genres);
        vec![
            feed.subscribe(move |event| songs.handle(event)),
            feed.subscribe(move |event| albums.handle(event)),
            feed.subscribe(move |event| artists.handle(event)),
            feed.subscribe(move |event| album_artists.handle(event)),
            feed.subscribe(move |event| genres.handle(event)),
        ]
    }

    pub fn reset(&self) {
        self.songs.reset();
        self.albums.reset();
        self.artists.reset();
        self.album_artists.reset();
        self.genres.reset();
        info!("Groove reset");
    }

    pub fn is_updating(&self) -> bool {
        self.songs.is_updating()
            || self.albums.is_updating()
            || self.artists.is_updating()
            || self.album_artists.is_updating()
            || self.genres.is_updating()
    }

    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    pub fn songs_of_album(&self, album_id: AlbumId) -> Vec<Arc<Song>> {
        self.albums.get_songs_of_key(&album_id, &self.songs)
    }

    pub fn songs_of_artist(&self, name: &str) -> Vec<Arc<Song>> {
        self.artists.get_songs_of_key(name, &self.songs)
    }

    pub fn albums_of_artist(&self, name: &str) -> Vec<Album> {
        self.artists.get_albums_of_key(name, &self.albums)
    }

    pub fn songs_of_album_artist(&self, name: &str) -> Vec<Arc<Song>> {
        self.album_artists.get_songs_of_key(name, &self.songs)
    }

    pub fn albums_of_album_artist(&self, name: &str) -> Vec<Album> {
        self.album_artists.get_albums_of_key(name, &self.albums)
    }

    pub fn songs_of_genre(&self, name: &str) -> Vec<Arc<Song>> {
        self.genres.get_songs_of_key(name, &self.songs)
    }

    pub fn albums_of_genre(&self, name: &str) -> Vec<Album> {
        self.genres.get_albums_of_key(name, &self.albums)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::track;
    use super::{AlbumRepository, Groove, GrooveConfig, GrooveError, MediaFeed};
    use crate::explorer::ExplorerEntry;
    use common::{Album, AlbumArtist, Artist, Genre, Song};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;

    type Snapshot = (
        Vec<Arc<Song>>,
        Vec<Album>,
        Vec<Artist>,
        Vec<AlbumArtist>,
        Vec<Genre>,
        Option<Vec<ExplorerEntry>>,
    );

    fn setup() -> (Groove, MediaFeed) {
        let groove = Groove::new(&GrooveConfig::default(), Handle::current());
        let feed = MediaFeed::new();
        groove.ready(&feed);
        (groove, feed)
    }

    fn scan(feed: &MediaFeed, songs: &[Song]) {
        let generation = feed.start_scan();
        for song in songs {
            feed.emit_song(generation, Arc::new(song.clone()));
        }
        feed.end_scan(generation);
    }

    fn snapshot(groove: &Groove) -> Snapshot {
        (
            groove.songs.get_all(),
            groove.albums.get_all(),
            groove.artists.get_all(),
            groove.album_artists.get_all(),
            groove.genres.get_all(),
            groove.songs.list_folder("").unwrap(),
        )
    }

    fn library() -> Vec<Song> {
        let mut first = track(1, "A/Ten/01.mp3", 10, "Ten", "A", "A");
        first.year = Some(1999);
        first.additional.genres = vec!["Rock".into(), "Pop".into()];
        let mut second = track(2, "A/Ten/02.mp3", 10, "Ten", "B", "A");
        second.year = Some(2001);
        second.additional.genres = vec!["Rock".into()];
        let third = track(3, "A/Twenty/01.mp3", 20, "Twenty", "A", "A");
        let fourth = track(4, "C/Solo/01.mp3", 30, "Solo", "C", "C");
        vec![first, second, third, fourth]
    }

    fn permutations(items: &[Song]) -> Vec<Vec<Song>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for index in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(index);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn album_artist_aggregates_tracks_and_albums() {
        let (groove, feed) = setup();
        scan(
            &feed,
            &[
                track(1, "A/Ten/01.mp3", 10, "Ten", "A", "A"),
                track(2, "A/Ten/02.mp3", 10, "Ten", "A", "A"),
                track(3, "A/Twenty/01.mp3", 20, "Twenty", "A", "A"),
            ],
        );

        assert_eq!(
            groove.album_artists.get_by_key("A"),
            Some(AlbumArtist {
                name: "A".into(),
                number_of_albums: 2,
                number_of_tracks: 3,
            })
        );
        assert_eq!(groove.album_artists.get_song_ids_of_key("A"), vec![1, 2, 3]);
        assert_eq!(groove.album_artists.get_album_ids_of_key("A"), vec![10, 20]);
        assert_eq!(groove.albums.count(), 2);
        assert_eq!(
            groove.albums.get_by_key(&10u64).map(|album| album.number_of_tracks),
            Some(2)
        );
        let names: Vec<String> = groove
            .albums_of_album_artist("A")
            .into_iter()
            .map(|album| album.name)
            .collect();
        assert_eq!(names, vec!["Ten".to_string(), "Twenty".to_string()]);
        assert!(!groove.is_updating());
    }

    #[tokio::test(start_paused = true)]
    async fn counts_match_secondary_indices() {
        let (groove, feed) = setup();
        scan(&feed, &library());

        for artist in groove.album_artists.get_all() {
            assert_eq!(
                artist.number_of_tracks,
                groove.album_artists.get_song_ids_of_key(&artist.name).len()
            );
            assert_eq!(
                artist.number_of_albums,
                groove.album_artists.get_album_ids_of_key(&artist.name).len()
            );
        }
        for artist in groove.artists.get_all() {
            assert_eq!(artist.number_of_tracks, groove.songs_of_artist(&artist.name).len());
            assert_eq!(artist.number_of_albums, groove.albums_of_artist(&artist.name).len());
        }
        for album in groove.albums.get_all() {
            assert_eq!(album.number_of_tracks, groove.songs_of_album(album.id).len());
        }
        for genre in groove.genres.get_all() {
            assert_eq!(genre.number_of_tracks, groove.songs_of_genre(&genre.name).len());
        }
        assert_eq!(groove.genres.get_by_key("Rock").map(|g| g.number_of_tracks), Some(2));
        assert_eq!(groove.albums_of_genre("Pop").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn album_merge_is_order_independent() {
        let songs = library();
        let (reference, feed) = setup();
        scan(&feed, &songs);
        let expected = snapshot(&reference);

        let ten = reference.albums.get_by_key(&10u64).unwrap();
        assert_eq!(ten.start_year, Some(1999));
        assert_eq!(ten.end_year, Some(2001));
        assert_eq!(ten.artists.len(), 2);
        assert_eq!(ten.album_artist.as_deref(), Some("A"));

        for order in permutations(&songs) {
            let (groove, feed) = setup();
            scan(&feed, &order);
            assert_eq!(snapshot(&groove), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_mid_scan_then_rescan_matches_cold_start() {
        let songs = library();
        let (cold, cold_feed) = setup();
        scan(&cold_feed, &songs);

        let (groove, feed) = setup();
        let stale = feed.start_scan();
        feed.emit_song(stale, Arc::new(songs[0].clone()));
        feed.emit_song(stale, Arc::new(songs[1].clone()));
        groove.reset();
        assert_eq!(groove.songs.count(), 0);
        assert_eq!(groove.albums.count(), 0);

        feed.emit_song(stale, Arc::new(songs[2].clone()));
        feed.end_scan(stale);
        assert_eq!(groove.songs.count(), 0);
        assert_eq!(groove.album_artists.count(), 0);
        assert!(groove.is_updating());

        scan(&feed, &songs);
        assert_eq!(snapshot(&groove), snapshot(&cold));
        assert!(!groove.is_updating());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_rejected() {
        let (groove, feed) = setup();
        let first = feed.start_scan();
        let second = feed.start_scan();
        let song = track(1, "A/01.mp3", 10, "Ten", "A", "A");
        assert_eq!(
            groove.albums.on_item_arrived(first, &song),
            Err(GrooveError::StaleGeneration {
                received: first.value(),
                accepted: Some(second.value()),
            })
        );
        assert_eq!(groove.albums.count(), 0);
        assert_eq!(groove.albums.on_item_arrived(second, &song), Ok(()));
        assert_eq!(groove.albums.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_updates_coalesce_and_flush_before_end() {
        let (groove, feed) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        let updates = Arc::new(AtomicUsize::new(0));
        {
            let log = Arc::clone(&log);
            groove.songs.signals.on_update_start.subscribe(move |_| log.lock().push("start"));
        }
        {
            let log = Arc::clone(&log);
            let updates = Arc::clone(&updates);
            groove.songs.signals.on_update.subscribe(move |_| {
                updates.fetch_add(1, Ordering::SeqCst);
                log.lock().push("update");
            });
        }
        {
            let log = Arc::clone(&log);
            groove.songs.signals.on_update_end.subscribe(move |_| log.lock().push("end"));
        }

        let generation = feed.start_scan();
        for id in 0..200u64 {
            let song = track(id, &format!("bulk/{id}.mp3"), 1, "Bulk", "A", "A");
            feed.emit_song(generation, Arc::new(song));
        }
        assert_eq!(updates.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(updates.load(Ordering::SeqCst), 1);

        feed.emit_song(
            generation,
            Arc::new(track(500, "bulk/500.mp3", 1, "Bulk", "A", "A")),
        );
        feed.end_scan(generation);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(updates.load(Ordering::SeqCst), 2);
        assert_eq!(*log.lock(), vec!["start", "update", "update", "end"]);
    }

    #[tokio::test(start_paused = true)]
    async fn songs_without_grouping_key_are_skipped() {
        let (groove, feed) = setup();
        let loose = track(1, "loose.mp3", 7, "", "", "");
        scan(&feed, &[loose.clone()]);

        assert_eq!(groove.songs.count(), 1);
        assert_eq!(groove.albums.count(), 0);
        assert_eq!(groove.artists.count(), 0);
        assert_eq!(groove.album_artists.count(), 0);
        assert_eq!(groove.genres.count(), 0);

        let generation = feed.start_scan();
        assert_eq!(
            groove.artists.on_item_arrived(generation, &loose),
            Err(GrooveError::MissingGroupingKey)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_path_only_skips_the_explorer() {
        let (groove, feed) = setup();
        let broken = track(1, "A//01.mp3", 10, "Ten", "A", "A");
        let fine = track(2, "A/02.mp3", 10, "Ten", "A", "A");

        let generation = feed.start_scan();
        assert_eq!(
            groove.songs.on_item_arrived(generation, Arc::new(broken.clone())),
            Err(GrooveError::InvalidPath("A//01.mp3".into()))
        );
        feed.emit_song(generation, Arc::new(fine));
        feed.end_scan(generation);

        assert!(groove.songs.has_song_with_id(1));
        assert_eq!(groove.songs.get_song_id_with_path("A//01.mp3"), Some(1));
        assert_eq!(groove.songs.song_ids_under("A").unwrap(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn moved_song_leaves_old_path() {
        let (groove, feed) = setup();
        let generation = feed.start_scan();
        feed.emit_song(
            generation,
            Arc::new(track(1, "Old/01.mp3", 10, "Ten", "A", "A")),
        );
        feed.emit_song(
            generation,
            Arc::new(track(1, "New/01.mp3", 10, "Ten", "A", "A")),
        );
        feed.end_scan(generation);

        assert_eq!(groove.songs.count(), 1);
        assert_eq!(groove.songs.get_song_id_with_path("Old/01.mp3"), None);
        assert_eq!(groove.songs.get_song_id_with_path("New/01.mp3"), Some(1));
        let root = groove.songs.list_folder("/").unwrap().unwrap();
        assert_eq!(
            root,
            vec![ExplorerEntry::Directory {
                name: "New".into(),
                children: 1,
            }]
        );
        assert_eq!(groove.songs.list_folder("Old").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn explorer_lists_directories_before_files() {
        let (groove, feed) = setup();
        scan(
            &feed,
            &[
                track(1, "A/b.mp3", 10, "Ten", "A", "A"),
                track(2, "A/Sub/c.mp3", 10, "Ten", "A", "A"),
                track(3, "A/a.mp3", 10, "Ten", "A", "A"),
            ],
        );
        let names: Vec<String> = groove
            .songs
            .list_folder("A")
            .unwrap()
            .unwrap()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect();
        assert_eq!(names, vec!["Sub", "a.mp3", "b.mp3"]);

        let mut under: Vec<u64> = groove.songs.songs_under("A").unwrap().iter().map(|s| s.id).collect();
        under.sort_unstable();
        assert_eq!(under, vec![1, 2, 3]);
        assert_eq!(groove.songs.explorer().root().name(), "root");
    }

    #[tokio::test(start_paused = true)]
    async fn search_ranks_exact_album_first() {
        let (groove, feed) = setup();
        scan(
            &feed,
            &[
                track(1, "x/1.mp3", 1, "Blue Train", "Coltrane", "Coltrane"),
                track(2, "x/2.mp3", 2, "Blue", "Joni", "Joni"),
                track(3, "x/3.mp3", 3, "Kind of Blue", "Miles", "Miles"),
            ],
        );
        let albums = groove.albums.get_all();
        let results = AlbumRepository::search(&albums, "blue", Some(groove.search_limit()));
        assert_eq!(results[0].entity.name, "Blue");
        assert_eq!(results.len(), 3);

        let limited = AlbumRepository::search(&albums, "blue", Some(1));
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn album_search_matches_every_contributing_artist() {
        let (groove, feed) = setup();
        scan(
            &feed,
            &[
                track(1, "Duets/1.mp3", 5, "Duets", "Adele", "Various"),
                track(2, "Duets/2.mp3", 5, "Duets", "Zappa", "Various"),
                track(3, "Other/1.mp3", 6, "Other", "Miles", "Miles"),
            ],
        );
        let albums = groove.albums.get_all();
        for artist in ["adele", "zappa"] {
            let results = AlbumRepository::search(&albums, artist, None);
            assert_eq!(results.len(), 1, "{artist}");
            assert_eq!(results[0].entity.name, "Duets");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn untitled_albums_stay_out_of_album_counts() {
        let (groove, feed) = setup();
        scan(
            &feed,
            &[
                track(1, "A/Ten/01.mp3", 10, "Ten", "A", "A"),
                track(2, "A/loose.mp3", 20, "", "A", "A"),
            ],
        );

        let album_artist = groove.album_artists.get_by_key("A").unwrap();
        assert_eq!(album_artist.number_of_tracks, 2);
        assert_eq!(album_artist.number_of_albums, 1);
        assert_eq!(
            album_artist.number_of_albums,
            groove.albums_of_album_artist("A").len()
        );
        assert_eq!(groove.album_artists.get_album_ids_of_key("A"), vec![10]);

        let artist = groove.artists.get_by_key("A").unwrap();
        assert_eq!(artist.number_of_albums, groove.albums_of_artist("A").len());
        assert_eq!(groove.albums.count(), 1);
    }

    fn bulk_library(count: u64) -> Vec<Song> {
        (0..count)
            .map(|id| {
                let album = id % 23;
                let mut song = track(
                    id,
                    &format!("Artist {}/Album {album}/{id}.mp3", album % 5),
                    album,
                    &format!("Album {album}"),
                    &format!("Artist {}", id % 7),
                    &format!("Artist {}", album % 5),
                );
                song.year = Some(1990 + (id % 11) as i32);
                song.additional.genres = vec![format!("Genre {}", id % 4)];
                song
            })
            .collect()
    }

    #[test]
    fn concurrent_reset_and_reads_settle_to_cold_start() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let config = GrooveConfig::default();
        let songs = bulk_library(900);

        let cold = Groove::new(&config, runtime.handle().clone());
        let cold_feed = MediaFeed::new();
        cold.ready(&cold_feed);
        scan(&cold_feed, &songs);

        let groove = Groove::new(&config, runtime.handle().clone());
        let feed = MediaFeed::new();
        groove.ready(&feed);
        let producing = AtomicBool::new(true);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                scan(&feed, &songs);
                producing.store(false, Ordering::SeqCst);
            });
            scope.spawn(|| {
                while groove.songs.count() < songs.len() / 3 && producing.load(Ordering::SeqCst) {
                    std::thread::yield_now();
                }
                groove.reset();
            });
            for _ in 0..2 {
                scope.spawn(|| {
                    while producing.load(Ordering::SeqCst) {
                        for album in groove.albums.get_all() {
                            assert!(album.number_of_tracks > 0);
                        }
                        let _ = groove.album_artists.get_by_key("Artist 0");
                        let _ = groove.genres.get_all();
                        let _ = groove.songs.get_all();
                    }
                });
            }
        });

        scan(&feed, &songs);
        assert!(!groove.is_updating());
        assert_eq!(groove.songs.count(), songs.len());
        assert_eq!(snapshot(&groove), snapshot(&cold));

        for artist in groove.album_artists.get_all() {
            assert_eq!(
                artist.number_of_tracks,
                groove.album_artists.get_song_ids_of_key(&artist.name).len()
            );
            assert_eq!(
                artist.number_of_albums,
                groove.albums_of_album_artist(&artist.name).len()
            );
        }
        for artist in groove.artists.get_all() {
            assert_eq!(
                artist.number_of_tracks,
                groove.artists.get_song_ids_of_key(&artist.name).len()
            );
        }
        for album in groove.albums.get_all() {
            assert_eq!(
                album.number_of_tracks,
                groove.albums.get_song_ids_of_key(&album.id).len()
            );
        }
        for genre in groove.genres.get_all() {
            assert_eq!(
                genre.number_of_tracks,
                groove.genres.get_song_ids_of_key(&genre.name).len()
            );
        }
    }
}
