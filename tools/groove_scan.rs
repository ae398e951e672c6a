mod media_source;
mod watch;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use groove::config::{config_path_from_env, load_or_create_config};
use groove::{
    AlbumArtistRepository, AlbumRepository, AlbumSortBy, ArtistRepository, ExplorerEntry,
    GenreRepository, Groove, MediaFeed, SongRepository,
};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::media_source::scan_directory;

#[derive(Debug, Serialize)]
struct Counts {
    songs: usize,
    albums: usize,
    artists: usize,
    album_artists: usize,
    genres: usize,
}

#[derive(Debug, Serialize)]
struct Hit {
    kind: &'static str,
    score: u32,
    name: String,
}

#[derive(Debug, Serialize)]
struct Report {
    counts: Counts,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hits: Vec<Hit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder: Option<Vec<ExplorerEntry>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    albums: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {}", config_path.display());
    }

    let mut args = env::args().skip(1);
    let music_root = args
        .next()
        .or_else(|| env::var("MUSIC_ROOT").ok())
        .ok_or("MUSIC_ROOT not set and no path argument")?;
    let query = args.next();
    let root = PathBuf::from(music_root);

    let groove = Arc::new(Groove::new(&config, Handle::current()));
    let feed = Arc::new(MediaFeed::new());
    groove.ready(&feed);

    let stats = {
        let feed = Arc::clone(&feed);
        let config = config.clone();
        let root = root.clone();
        tokio::task::spawn_blocking(move || scan_directory(&root, &config, &feed)).await?
    };
    if stats.tag_errors > 0 {
        warn!("{} files had unreadable tags", stats.tag_errors);
    }

    let folder = match env::var("GROOVE_FOLDER") {
        Ok(path) => groove.songs.list_folder(&path)?,
        Err(_) => None,
    };
    let album_order = match env::var("GROOVE_SORT") {
        Ok(value) => Some(
            AlbumSortBy::parse(&value).ok_or_else(|| format!("unknown album sort key {value:?}"))?,
        ),
        Err(_) => None,
    };
    let reversed = env::var("GROOVE_SORT_REVERSED").map(|v| v == "1").unwrap_or(false);
    let mut report = build_report(&groove, query, folder);
    if let Some(by) = album_order {
        report.albums = AlbumRepository::sort(&groove.albums.get_all(), by, reversed)
            .into_iter()
            .map(|album| album.name)
            .collect();
    }
    if env::var("GROOVE_JSON").map(|v| v == "1").unwrap_or(false) {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if config.watch_music {
        let _watcher = watch::setup_watcher(
            Arc::clone(&groove),
            Arc::clone(&feed),
            config.clone(),
            root,
        )?;
        tokio::signal::ctrl_c().await?;
        info!("Stopping watcher");
    }

    Ok(())
}

fn build_report(groove: &Groove, query: Option<String>, folder: Option<Vec<ExplorerEntry>>) -> Report {
    let counts = Counts {
        songs: groove.songs.count(),
        albums: groove.albums.count(),
        artists: groove.artists.count(),
        album_artists: groove.album_artists.count(),
        genres: groove.genres.count(),
    };
    let hits = match &query {
        Some(terms) => search_all(groove, terms),
        None => Vec::new(),
    };
    Report {
        counts,
        query,
        hits,
        folder,
        albums: Vec::new(),
    }
}

fn search_all(groove: &Groove, terms: &str) -> Vec<Hit> {
    let limit = Some(groove.search_limit());
    let mut hits = Vec::new();
    for result in SongRepository::search(&groove.songs.get_all(), terms, limit) {
        hits.push(Hit {
            kind: "song",
            score: result.score,
            name: result.entity.title.clone(),
        });
    }
    for result in AlbumRepository::search(&groove.albums.get_all(), terms, limit) {
        hits.push(Hit {
            kind: "album",
            score: result.score,
            name: result.entity.name,
        });
    }
    for result in ArtistRepository::search(&groove.artists.get_all(), terms, limit) {
        hits.push(Hit {
            kind: "artist",
            score: result.score,
            name: result.entity.name,
        });
    }
    for result in AlbumArtistRepository::search(&groove.album_artists.get_all(), terms, limit) {
        hits.push(Hit {
            kind: "album_artist",
            score: result.score,
            name: result.entity.name,
        });
    }
    for result in GenreRepository::search(&groove.genres.get_all(), terms, limit) {
        hits.push(Hit {
            kind: "genre",
            score: result.score,
            name: result.entity.name,
        });
    }
    hits
}

fn print_report(report: &Report) {
    let counts = &report.counts;
    println!(
        "Indexed: {} songs, {} albums, {} artists, {} album artists, {} genres",
        counts.songs, counts.albums, counts.artists, counts.album_artists, counts.genres
    );
    if let Some(query) = &report.query {
        println!("Results for {:?}:", query);
        for hit in &report.hits {
            println!("  [{}] {} ({})", hit.kind, hit.name, hit.score);
        }
    }
    if let Some(entries) = &report.folder {
        for entry in entries {
            match entry {
                ExplorerEntry::Directory { name, children } => {
                    println!("  {}/ ({} entries)", name, children)
                }
                ExplorerEntry::File { name, .. } => println!("  {}", name),
            }
        }
    }
    for name in &report.albums {
        println!("  {}", name);
    }
}
