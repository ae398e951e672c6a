use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use groove::{Groove, GrooveConfig, MediaFeed};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::media_source::scan_directory;

/// Keeps `groove` in sync with `root`: every burst of filesystem changes
/// resets the index and rescans once the debounce window is quiet.
pub fn setup_watcher(
    groove: Arc<Groove>,
    feed: Arc<MediaFeed>,
    config: GrooveConfig,
    root: PathBuf,
) -> Result<RecommendedWatcher, Box<dyn std::error::Error>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    let debounce = config.watch_debounce();
    info!(
        "Watching {} for changes (debounce {}s)",
        root.display(),
        debounce.as_secs()
    );
    tokio::spawn(async move {
        watch_loop(groove, feed, config, root, rx, debounce).await;
    });

    Ok(watcher)
}

async fn watch_loop(
    groove: Arc<Groove>,
    feed: Arc<MediaFeed>,
    config: GrooveConfig,
    root: PathBuf,
    mut rx: UnboundedReceiver<Event>,
    debounce: Duration,
) {
    loop {
        let event = match rx.recv().await {
            Some(event) => event,
            None => break,
        };
        if !is_relevant_event(&event) {
            continue;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {
                    info!("Library changed; rescanning {}", root.display());
                    groove.reset();
                    let feed = Arc::clone(&feed);
                    let config = config.clone();
                    let root = root.clone();
                    match tokio::task::spawn_blocking(move || scan_directory(&root, &config, &feed)).await {
                        Ok(stats) => info!(
                            "Auto-scan complete: {} songs, {} albums, {} artists ({} files, {} tag errors)",
                            groove.songs.count(),
                            groove.albums.count(),
                            groove.artists.count(),
                            stats.files,
                            stats.tag_errors
                        ),
                        Err(err) => warn!("Auto-rescan join error: {}", err),
                    }
                    break;
                }
                maybe_event = rx.recv() => {
                    if let Some(event) = maybe_event {
                        if !is_relevant_event(&event) {
                            continue;
                        }
                    } else {
                        return;
                    }
                }
            }
        }
    }
}

fn is_relevant_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
