use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{Song, SongId};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::error::GrooveError;
use crate::explorer::{ExplorerEntry, ExplorerNode, ExplorerPath, GrooveExplorer};
use crate::feed::{MediaEvent, ScanGeneration};
use crate::repository::{RepositorySignals, ScanGate};
use crate::search::{FuzzyResult, FuzzySearchOption, FuzzySearcher, SubListNonStrict};
use crate::sort::{self, SongSortBy};

pub const EXPLORER_ROOT: &str = "root";

struct SongState {
    cache: HashMap<SongId, Arc<Song>>,
    path_cache: HashMap<String, SongId>,
    explorer: GrooveExplorer,
}

impl SongState {
    fn new() -> Self {
        Self {
            cache: HashMap::new(),
            path_cache: HashMap::new(),
            explorer: GrooveExplorer::new(EXPLORER_ROOT),
        }
    }

    /// Forgets where a re-indexed song used to live.
    fn detach_path(&mut self, previous: &Song) {
        if self.path_cache.get(&previous.path) == Some(&previous.id) {
            self.path_cache.remove(&previous.path);
        }
        if let Ok(path) = ExplorerPath::parse(&previous.path) {
            let owned = matches!(
                self.explorer.get(&path),
                Some(ExplorerNode::File(file)) if file.data == Some(previous.id)
            );
            if owned {
                self.explorer.remove_relative_path(&path);
            }
        }
    }
}

/// Songs by id, by path and by folder.
pub struct SongRepository {
    state: RwLock<SongState>,
    gate: ScanGate,
    pub signals: RepositorySignals,
}

impl SongRepository {
    pub fn new(window: Duration, runtime: Handle) -> Self {
        Self {
            state: RwLock::new(SongState::new()),
            gate: ScanGate::new("song"),
            signals: RepositorySignals::new(window, runtime),
        }
    }

    pub fn is_updating(&self) -> bool {
        self.gate.is_updating()
    }

    pub fn handle(&self, event: &MediaEvent) {
        let result = match event {
            MediaEvent::ScanStarted(generation) => {
                self.on_scan_start(*generation);
                Ok(())
            }
            MediaEvent::SongArrived(generation, song) => {
                self.on_item_arrived(*generation, Arc::clone(song))
            }
            MediaEvent::ScanEnded(generation) => self.on_scan_end(*generation),
        };
        self.gate.report(event, &result);
    }

    pub fn on_scan_start(&self, generation: ScanGeneration) {
        self.gate.begin(generation);
        self.signals.started();
    }

    /// Indexes a song by id and path and files it in the explorer. A path the
    /// explorer rejects still leaves the song reachable by id and path.
    pub fn on_item_arrived(
        &self,
        generation: ScanGeneration,
        song: Arc<Song>,
    ) -> Result<(), GrooveError> {
        let guard = self.gate.admit(generation)?;
        let filed = {
            let mut state = self.state.write();
            let state = &mut *state;
            if let Some(previous) = state.cache.insert(song.id, Arc::clone(&song)) {
                if previous.path != song.path {
                    debug!("Song {} moved from {:?} to {:?}", song.id, previous.path, song.path);
                    state.detach_path(&previous);
                }
            }
            state.path_cache.insert(song.path.clone(), song.id);
            ExplorerPath::parse(&song.path).and_then(|path| {
                let file = state.explorer.add_relative_path(&path)?;
                file.data = Some(song.id);
                Ok(())
            })
        };
        drop(guard);
        self.signals.updated();
        filed
    }

    pub fn on_scan_end(&self, generation: ScanGeneration) -> Result<(), GrooveError> {
        self.gate.finish(generation)?;
        info!("Song index updated: {} songs", self.count());
        self.signals.ended();
        Ok(())
    }

    pub fn reset(&self) {
        {
            let _guard = self.gate.invalidate();
            let mut state = self.state.write();
            state.cache.clear();
            state.path_cache.clear();
            state.explorer.reset();
        }
        debug!("Song index reset");
        self.signals.cleared();
    }

    pub fn count(&self) -> usize {
        self.state.read().cache.len()
    }

    /// All songs, ordered by id.
    pub fn get_all(&self) -> Vec<Arc<Song>> {
        let state = self.state.read();
        let mut songs: Vec<Arc<Song>> = state.cache.values().cloned().collect();
        songs.sort_by_key(|song| song.id);
        songs
    }

    pub fn get_song_with_id(&self, id: SongId) -> Option<Arc<Song>> {
        self.state.read().cache.get(&id).cloned()
    }

    pub fn has_song_with_id(&self, id: SongId) -> bool {
        self.state.read().cache.contains_key(&id)
    }

    pub fn get_song_id_with_path(&self, path: &str) -> Option<SongId> {
        self.state.read().path_cache.get(path).copied()
    }

    pub fn explorer(&self) -> MappedRwLockReadGuard<'_, GrooveExplorer> {
        RwLockReadGuard::map(self.state.read(), |state| &state.explorer)
    }

    pub fn list_folder(&self, path: &str) -> Result<Option<Vec<ExplorerEntry>>, GrooveError> {
        self.state.read().explorer.list(path)
    }

    pub fn song_ids_under(&self, path: &str) -> Result<Vec<SongId>, GrooveError> {
        self.state.read().explorer.files_under(path)
    }

    pub fn songs_under(&self, path: &str) -> Result<Vec<Arc<Song>>, GrooveError> {
        let state = self.state.read();
        let ids = state.explorer.files_under(path)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| state.cache.get(&id).cloned())
            .collect())
    }

    pub fn search<E>(items: &[E], terms: &str, limit: Option<usize>) -> Vec<FuzzyResult<E>>
    where
        E: Borrow<Song> + Clone,
    {
        let results = searcher().search(terms, items);
        let limit = limit.unwrap_or(results.len());
        results.sub_list_non_strict(limit)
    }

    pub fn sort<E>(items: &[E], by: SongSortBy, reversed: bool) -> Vec<E>
    where
        E: Borrow<Song> + Clone,
    {
        sort::sort::<Song, E, SongSortBy>(items, by, reversed)
    }
}

fn searcher() -> FuzzySearcher<Song> {
    FuzzySearcher::new(vec![
        FuzzySearchOption::weighted(song_title, 3),
        FuzzySearchOption::weighted(song_filename, 2),
        FuzzySearchOption::new(song_artist),
        FuzzySearchOption::new(song_album),
    ])
}

fn song_title(song: &Song) -> Option<&str> {
    Some(&song.title)
}

fn song_filename(song: &Song) -> Option<&str> {
    Some(&song.filename)
}

fn song_artist(song: &Song) -> Option<&str> {
    song.artist_name.as_deref()
}

fn song_album(song: &Song) -> Option<&str> {
    song.album_name.as_deref()
}
