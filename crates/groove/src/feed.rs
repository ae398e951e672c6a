use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::Song;
use tracing::info;

use crate::events::{EventBus, SubscriptionHandle};

/// One start → items → end cycle of the media source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanGeneration(u64);

impl ScanGeneration {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScanGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub enum MediaEvent {
    ScanStarted(ScanGeneration),
    SongArrived(ScanGeneration, Arc<Song>),
    ScanEnded(ScanGeneration),
}

impl MediaEvent {
    pub fn generation(&self) -> ScanGeneration {
        match self {
            MediaEvent::ScanStarted(generation)
            | MediaEvent::SongArrived(generation, _)
            | MediaEvent::ScanEnded(generation) => *generation,
        }
    }
}

/// The interface a media source drives. Events are delivered synchronously,
/// in order, to every subscribed repository.
pub struct MediaFeed {
    bus: EventBus<MediaEvent>,
    next_generation: AtomicU64,
}

impl Default for MediaFeed {
    fn default() -> Self {
        Self {
            bus: EventBus::new(),
            next_generation: AtomicU64::new(1),
        }
    }
}

impl MediaFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.bus.unsubscribe(handle)
    }

    pub fn start_scan(&self) -> ScanGeneration {
        let generation = ScanGeneration(self.next_generation.fetch_add(1, Ordering::Relaxed));
        info!("Media scan {} started", generation);
        self.bus.dispatch(&MediaEvent::ScanStarted(generation));
        generation
    }

    pub fn emit_song(&self, generation: ScanGeneration, song: Arc<Song>) {
        self.bus.dispatch(&MediaEvent::SongArrived(generation, song));
    }

    pub fn end_scan(&self, generation: ScanGeneration) {
        self.bus.dispatch(&MediaEvent::ScanEnded(generation));
        info!("Media scan {} finished", generation);
    }
}
