use thiserror::Error;

/// Per-item conditions raised while indexing. None of them abort a scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrooveError {
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("song has no grouping key")]
    MissingGroupingKey,
    #[error("stale scan generation {received} (accepting {accepted:?})")]
    StaleGeneration {
        received: u64,
        accepted: Option<u64>,
    },
}
