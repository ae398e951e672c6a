use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{AlbumId, Song, SongId};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

use crate::error::GrooveError;
use crate::events::{EventBus, RapidUpdateDispatcher};
use crate::feed::{MediaEvent, ScanGeneration};
use crate::groupings::album_key;
use crate::search::{FuzzyResult, FuzzySearcher, SubListNonStrict};
use crate::song::SongRepository;
use crate::sort::{self, SortBy};

/// Observer hooks shared by every repository.
pub struct RepositorySignals {
    pub on_update_start: Arc<EventBus<()>>,
    pub on_update: Arc<EventBus<()>>,
    pub on_update_end: Arc<EventBus<()>>,
    rapid: RapidUpdateDispatcher,
}

impl RepositorySignals {
    pub fn new(window: Duration, runtime: Handle) -> Self {
        let on_update = Arc::new(EventBus::new());
        let rapid = RapidUpdateDispatcher::new(Arc::clone(&on_update), window, runtime);
        Self {
            on_update_start: Arc::new(EventBus::new()),
            on_update,
            on_update_end: Arc::new(EventBus::new()),
            rapid,
        }
    }

    pub(crate) fn started(&self) {
        self.on_update_start.dispatch(&());
    }

    pub(crate) fn updated(&self) {
        self.rapid.dispatch();
    }

    pub(crate) fn ended(&self) {
        self.rapid.flush();
        self.on_update_end.dispatch(&());
    }

    pub(crate) fn cleared(&self) {
        self.rapid.cancel();
        self.on_update.dispatch(&());
    }
}

/// Single-writer gate. Holding the returned guard orders item processing
/// against `reset`, and only the generation of the latest scan start passes.
pub(crate) struct ScanGate {
    kind: &'static str,
    accepted: Mutex<Option<ScanGeneration>>,
    is_updating: AtomicBool,
}

impl ScanGate {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            accepted: Mutex::new(None),
            is_updating: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_updating(&self) -> bool {
        self.is_updating.load(Ordering::Acquire)
    }

    pub(crate) fn begin(&self, generation: ScanGeneration) {
        *self.accepted.lock() = Some(generation);
        self.is_updating.store(true, Ordering::Release);
    }

    pub(crate) fn admit(
        &self,
        generation: ScanGeneration,
    ) -> Result<MutexGuard<'_, Option<ScanGeneration>>, GrooveError> {
        let guard = self.accepted.lock();
        let accepted = *guard;
        if accepted != Some(generation) {
            return Err(GrooveError::StaleGeneration {
                received: generation.value(),
                accepted: accepted.map(ScanGeneration::value),
            });
        }
        Ok(guard)
    }

    pub(crate) fn finish(&self, generation: ScanGeneration) -> Result<(), GrooveError> {
        let _guard = self.admit(generation)?;
        self.is_updating.store(false, Ordering::Release);
        Ok(())
    }

    pub(crate) fn invalidate(&self) -> MutexGuard<'_, Option<ScanGeneration>> {
        let mut guard = self.accepted.lock();
        *guard = None;
        guard
    }

    pub(crate) fn report(&self, event: &MediaEvent, result: &Result<(), GrooveError>) {
        let generation = event.generation();
        match result {
            Ok(()) => {}
            Err(GrooveError::MissingGroupingKey) => {
                trace!("{} {}: song has no grouping key; skipped", self.kind, generation)
            }
            Err(err @ GrooveError::StaleGeneration { .. }) => {
                debug!("{} {}: dropped event: {}", self.kind, generation, err)
            }
            Err(err @ GrooveError::InvalidPath(_)) => {
                warn!("{} {}: {}", self.kind, generation, err)
            }
        }
    }
}

/// Cardinalities of a key's secondary-index sets at the time of an upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Members {
    pub tracks: usize,
    pub albums: usize,
}

/// Describes how one entity kind groups songs and folds them into an
/// aggregate record.
pub trait Grouping: Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Ord + Debug + Send + Sync;
    type Entity: Clone + Send + Sync;
    type SortKey: SortBy<Self::Entity>;

    const KIND: &'static str;

    /// Keys this song contributes to; empty when the grouping field is absent.
    fn keys(song: &Song) -> Vec<Self::Key>;

    /// Builds the aggregate after `song` joined `key`. The result must not
    /// depend on the order songs arrive in.
    fn aggregate(
        key: &Self::Key,
        song: &Song,
        existing: Option<&Self::Entity>,
        members: Members,
    ) -> Self::Entity;

    fn searcher() -> FuzzySearcher<Self::Entity>;
}

struct GroupState<G: Grouping> {
    cache: HashMap<G::Key, G::Entity>,
    song_ids: HashMap<G::Key, HashSet<SongId>>,
    album_ids: HashMap<G::Key, HashSet<AlbumId>>,
}

impl<G: Grouping> Default for GroupState<G> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            song_ids: HashMap::new(),
            album_ids: HashMap::new(),
        }
    }
}

/// Cache of one grouped entity kind plus its song-id and album-id indices.
pub struct GroupedRepository<G: Grouping> {
    state: RwLock<GroupState<G>>,
    gate: ScanGate,
    pub signals: RepositorySignals,
}

impl<G: Grouping> GroupedRepository<G> {
    pub fn new(window: Duration, runtime: Handle) -> Self {
        Self {
            state: RwLock::new(GroupState::default()),
            gate: ScanGate::new(G::KIND),
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
            MediaEvent::SongArrived(generation, song) => self.on_item_arrived(*generation, song),
            MediaEvent::ScanEnded(generation) => self.on_scan_end(*generation),
        };
        self.gate.report(event, &result);
    }

    pub fn on_scan_start(&self, generation: ScanGeneration) {
        self.gate.begin(generation);
        self.signals.started();
    }

    pub fn on_item_arrived(
        &self,
        generation: ScanGeneration,
        song: &Song,
    ) -> Result<(), GrooveError> {
        let guard = self.gate.admit(generation)?;
        let keys = G::keys(song);
        if keys.is_empty() {
            return Err(GrooveError::MissingGroupingKey);
        }
        let album = album_key(song);
        {
            let mut state = self.state.write();
            let state = &mut *state;
            for key in keys {
                let songs = state.song_ids.entry(key.clone()).or_default();
                songs.insert(song.id);
                let tracks = songs.len();
                let albums = state.album_ids.entry(key.clone()).or_default();
                if let Some(album_id) = album {
                    albums.insert(album_id);
                }
                let members = Members {
                    tracks,
                    albums: albums.len(),
                };
                let entity = G::aggregate(&key, song, state.cache.get(&key), members);
                state.cache.insert(key, entity);
            }
        }
        drop(guard);
        self.signals.updated();
        Ok(())
    }

    pub fn on_scan_end(&self, generation: ScanGeneration) -> Result<(), GrooveError> {
        self.gate.finish(generation)?;
        info!("{} index updated: {} entries", G::KIND, self.count());
        self.signals.ended();
        Ok(())
    }

    /// Drops every cached entity and index; a scan in flight is invalidated.
    pub fn reset(&self) {
        {
            let _guard = self.gate.invalidate();
            *self.state.write() = GroupState::default();
        }
        debug!("{} index reset", G::KIND);
        self.signals.cleared();
    }

    pub fn count(&self) -> usize {
        self.state.read().cache.len()
    }

    pub fn get_all(&self) -> Vec<G::Entity> {
        let state = self.state.read();
        let mut keys: Vec<&G::Key> = state.cache.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| state.cache.get(key).cloned())
            .collect()
    }

    pub fn get_by_key<Q>(&self, key: &Q) -> Option<G::Entity>
    where
        G::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.read().cache.get(key).cloned()
    }

    pub fn get_song_ids_of_key<Q>(&self, key: &Q) -> Vec<SongId>
    where
        G::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        sorted_ids(self.state.read().song_ids.get(key))
    }

    pub fn get_album_ids_of_key<Q>(&self, key: &Q) -> Vec<AlbumId>
    where
        G::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        sorted_ids(self.state.read().album_ids.get(key))
    }

    pub fn get_songs_of_key<Q>(&self, key: &Q, songs: &SongRepository) -> Vec<Arc<Song>>
    where
        G::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_song_ids_of_key(key)
            .into_iter()
            .filter_map(|id| songs.get_song_with_id(id))
            .collect()
    }

    pub fn get_albums_of_key<Q, A>(&self, key: &Q, albums: &GroupedRepository<A>) -> Vec<A::Entity>
    where
        G::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        A: Grouping<Key = AlbumId>,
    {
        self.get_album_ids_of_key(key)
            .into_iter()
            .filter_map(|id| albums.get_by_key(&id))
            .collect()
    }

    pub fn search<E>(items: &[E], terms: &str, limit: Option<usize>) -> Vec<FuzzyResult<E>>
    where
        E: Borrow<G::Entity> + Clone,
    {
        let results = G::searcher().search(terms, items);
        let limit = limit.unwrap_or(results.len());
        results.sub_list_non_strict(limit)
    }

    pub fn sort<E>(items: &[E], by: G::SortKey, reversed: bool) -> Vec<E>
    where
        E: Borrow<G::Entity> + Clone,
    {
        sort::sort::<G::Entity, E, G::SortKey>(items, by, reversed)
    }
}

fn sorted_ids(ids: Option<&HashSet<u64>>) -> Vec<u64> {
    let mut out: Vec<u64> = ids.map(|set| set.iter().copied().collect()).unwrap_or_default();
    out.sort_unstable();
    out
}
