use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::models::Movie;

/// Storage key the watchlist is persisted under.
pub const WATCHLIST_KEY: &str = "watchlist";

/// Durable string storage, one value per key.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {:?}", self.dir))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        store.put(key, value);
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchlistEvent {
    Added { id: i32, title: String },
    Removed { id: i32, title: String },
}

impl fmt::Display for WatchlistEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchlistEvent::Added { title, .. } => write!(f, "Added \"{title}\" to watchlist"),
            WatchlistEvent::Removed { title, .. } => {
                write!(f, "Removed \"{title}\" from watchlist")
            }
        }
    }
}

/// Receives one acknowledgment per effective watchlist change.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &WatchlistEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &WatchlistEvent) {
        info!("{}", event);
    }
}

/// Ordered, id-unique list of saved movies mirrored to a [`KeyValueStore`].
///
/// The in-memory list is authoritative. Storage is read once by
/// [`Watchlist::load`] and written after every effective mutation, before the
/// mutating call returns.
pub struct Watchlist {
    movies: Vec<Movie>,
    storage: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
}

impl Watchlist {
    /// Seed from storage. Missing, empty or malformed data yields an empty
    /// list; this never fails.
    pub fn load(storage: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>) -> Self {
        let movies = read_saved(storage.as_ref());
        debug!("Loaded {} watchlist entries", movies.len());
        Self {
            movies,
            storage,
            notifier,
        }
    }

    /// Append `movie` unless its id is already present. Returns whether the
    /// list changed.
    pub fn add(&mut self, movie: Movie) -> bool {
        if self.contains(movie.id) {
            return false;
        }
        let event = WatchlistEvent::Added {
            id: movie.id,
            title: movie.title.clone(),
        };
        self.movies.push(movie);
        self.persist();
        self.notifier.notify(&event);
        true
    }

    /// Drop the entry with `id`, keeping the order of the rest. Returns
    /// whether the list changed.
    pub fn remove(&mut self, id: i32) -> bool {
        let Some(pos) = self.movies.iter().position(|m| m.id == id) else {
            return false;
        };
        let removed = self.movies.remove(pos);
        self.persist();
        self.notifier.notify(&WatchlistEvent::Removed {
            id,
            title: removed.title,
        });
        true
    }

    /// Add when absent, remove when present. Returns whether the movie is
    /// saved afterwards.
    pub fn toggle(&mut self, movie: Movie) -> bool {
        if self.contains(movie.id) {
            self.remove(movie.id);
            false
        } else {
            self.add(movie)
        }
    }

    pub fn contains(&self, id: i32) -> bool {
        self.movies.iter().any(|m| m.id == id)
    }

    pub fn list(&self) -> &[Movie] {
        &self.movies
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.movies)
            .context("Failed to serialize watchlist")
            .and_then(|raw| self.storage.save(WATCHLIST_KEY, &raw));
        if let Err(e) = result {
            warn!("Watchlist change not persisted: {:#}", e);
        }
    }
}

fn read_saved(storage: &dyn KeyValueStore) -> Vec<Movie> {
    let raw = match storage.load(WATCHLIST_KEY) {
        Ok(Some(raw)) if !raw.trim().is_empty() => raw,
        Ok(_) => return Vec::new(),
        Err(e) => {
            warn!("Could not read saved watchlist, starting empty: {:#}", e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<Movie>>(&raw) {
        Ok(movies) => {
            let mut seen = HashSet::new();
            movies.into_iter().filter(|m| seen.insert(m.id)).collect()
        }
        Err(e) => {
            warn!("Saved watchlist is malformed, starting empty: {}", e);
            Vec::new()
        }
    }
}
