use cinehub::models::Movie;
use cinehub::watchlist::{
    FileStore, KeyValueStore, MemoryStore, Notifier, Watchlist, WatchlistEvent, WATCHLIST_KEY,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<WatchlistEvent>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &WatchlistEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }
}

struct FailingStore;

impl KeyValueStore for FailingStore {
    fn load(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow::anyhow!("storage unavailable"))
    }

    fn save(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }
}

fn movie(id: i32, title: &str) -> Movie {
    Movie {
        id,
        title: title.to_string(),
        poster_path: Some(format!("/{id}.jpg")),
        backdrop_path: None,
        vote_average: 7.5,
        vote_count: 1200,
        release_date: "2010-07-16".to_string(),
        overview: "A thief who steals corporate secrets.".to_string(),
        genre_ids: Some(vec![28, 878]),
        popularity: 83.2,
        adult: false,
        original_language: "en".to_string(),
        original_title: title.to_string(),
        video: false,
    }
}

fn open(store: &Arc<MemoryStore>) -> (Watchlist, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let list = Watchlist::load(store.clone(), notifier.clone());
    (list, notifier)
}

fn ids(list: &Watchlist) -> Vec<i32> {
    list.list().iter().map(|m| m.id).collect()
}

#[test]
fn duplicate_adds_keep_one_entry_and_one_notification() {
    let store = Arc::new(MemoryStore::default());
    let (mut list, notifier) = open(&store);

    assert!(list.add(movie(27205, "Inception")));
    assert!(list.add(movie(155, "The Dark Knight")));
    assert!(!list.add(movie(27205, "Inception")));

    assert_eq!(ids(&list), vec![27205, 155]);
    assert_eq!(
        notifier.messages(),
        vec![
            "Added \"Inception\" to watchlist",
            "Added \"The Dark Knight\" to watchlist"
        ]
    );
}

#[test]
fn remove_keeps_relative_order() {
    let store = Arc::new(MemoryStore::default());
    let (mut list, notifier) = open(&store);
    for (id, title) in [(1, "Alien"), (2, "Aliens"), (3, "Alien 3")] {
        list.add(movie(id, title));
    }

    assert!(list.remove(2));

    assert_eq!(ids(&list), vec![1, 3]);
    assert!(!list.contains(2));
    assert_eq!(
        notifier.messages().last().map(String::as_str),
        Some("Removed \"Aliens\" from watchlist")
    );
}

#[test]
fn removing_absent_id_is_silent() {
    let store = Arc::new(MemoryStore::default());
    let (mut list, notifier) = open(&store);
    list.add(movie(1, "Alien"));
    let saved = store.get(WATCHLIST_KEY);

    assert!(!list.remove(99));

    assert_eq!(ids(&list), vec![1]);
    assert_eq!(notifier.messages().len(), 1);
    assert_eq!(store.get(WATCHLIST_KEY), saved);
}

#[test]
fn every_change_is_persisted_and_reloads_identically() {
    let store = Arc::new(MemoryStore::default());
    let (mut list, _) = open(&store);
    list.add(movie(1, "Alien"));
    list.add(movie(2, "Aliens"));
    list.add(movie(3, "Alien 3"));
    list.remove(1);

    let (reloaded, _) = open(&store);
    assert_eq!(reloaded.list(), list.list());
    assert_eq!(ids(&reloaded), vec![2, 3]);
}

#[test]
fn toggle_adds_then_removes() {
    let store = Arc::new(MemoryStore::default());
    let (mut list, notifier) = open(&store);

    assert!(list.toggle(movie(1, "Alien")));
    assert!(!list.toggle(movie(1, "Alien")));

    assert!(list.is_empty());
    assert_eq!(notifier.messages().len(), 2);
}

#[test]
fn malformed_saved_data_starts_empty() {
    for raw in ["{not json", r#"{"id": 1, "title": "Alien"}"#, "42", "", "   "] {
        let store = Arc::new(MemoryStore::with_value(WATCHLIST_KEY, raw));
        let (list, _) = open(&store);
        assert!(list.is_empty(), "expected empty list for {raw:?}");
    }
}

#[test]
fn saved_duplicates_collapse_on_load() {
    let saved = serde_json::to_string(&vec![
        movie(1, "Alien"),
        movie(2, "Aliens"),
        movie(1, "Alien (copy)"),
    ])
    .unwrap();
    let store = Arc::new(MemoryStore::with_value(WATCHLIST_KEY, &saved));
    let (list, _) = open(&store);

    assert_eq!(ids(&list), vec![1, 2]);
    assert_eq!(list.list()[0].title, "Alien");
}

#[test]
fn storage_failures_never_reach_the_caller() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut list = Watchlist::load(Arc::new(FailingStore), notifier.clone());

    assert!(list.is_empty());
    assert!(list.add(movie(1, "Alien")));
    assert!(list.contains(1));
    assert_eq!(notifier.messages().len(), 1);
}

#[test]
fn file_store_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("nested")));
    {
        let mut list = Watchlist::load(store.clone(), Arc::new(RecordingNotifier::default()));
        list.add(movie(27205, "Inception"));
        list.add(movie(155, "The Dark Knight"));
    }

    assert!(store.path_for(WATCHLIST_KEY).exists());
    let list = Watchlist::load(store, Arc::new(RecordingNotifier::default()));
    assert_eq!(ids(&list), vec![27205, 155]);
}

#[test]
fn file_store_reports_missing_file_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    assert_eq!(store.load(WATCHLIST_KEY).unwrap(), None);
}

#[test]
fn saved_entries_with_null_fields_still_load() {
    let saved = r#"[
        {"id": 1, "title": "Alien", "release_date": null, "overview": null, "poster_path": null},
        {"id": 2, "title": "Aliens", "release_date": "1986-07-18", "vote_average": null}
    ]"#;
    let store = Arc::new(MemoryStore::with_value(WATCHLIST_KEY, saved));
    let (list, _) = open(&store);

    assert_eq!(ids(&list), vec![1, 2]);
    assert_eq!(list.list()[0].release_date, "");
    assert_eq!(list.list()[1].vote_average, 0.0);
}
