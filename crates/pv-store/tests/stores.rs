use std::sync::Arc;

use chrono::Utc;
use pv_core::events::events::SetupFinished;
use pv_core::{
    AppState, CoreError, Course, FileStore, NewFile, PlotSettings, ReplayOutcome, ViewChanges,
    ViewStore, ZoomChanges, ZoomPath, ZoomSettings, ZoomState, ZoomStore, ZoomWindow,
};
use pv_store::{MemoryStore, SqliteStore};
use uuid::Uuid;

fn new_file(md5: &str) -> NewFile {
    NewFile {
        nickname: "measurements.csv".to_string(),
        filename: "20240101120000.csv".to_string(),
        mimetype: "text/csv".to_string(),
        md5: md5.to_string(),
        size: 42,
    }
}

fn plots() -> Vec<PlotSettings> {
    vec![
        PlotSettings {
            x_column: "linear scale".to_string(),
            values: vec![
                Course::new("pressure", "SMA20", "#ff0000"),
                Course::new("temperature", "", "#00ff00"),
                Course::new("humidity", "x100", "#0000ff"),
            ],
        },
        PlotSettings {
            x_column: "t".to_string(),
            values: vec![Course::new("v", "", "#000000")],
        },
    ]
}

fn window(start: f64, end: f64) -> ZoomWindow {
    ZoomWindow::range(start, end).unwrap()
}

async fn check_files<S: FileStore>(store: &S) {
    let first = store.save(new_file("abc")).await.unwrap();
    let _other = store.save(new_file("def")).await.unwrap();

    let matches = store.find_by_md5_and_mimetype("abc", "text/csv").await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, first);
    assert!(store.find_by_md5_and_mimetype("abc", "text/plain").await.unwrap().is_empty());

    store.rename(first, "renamed").await.unwrap();
    let now = Utc::now();
    store.touch(first, now).await.unwrap();
    let record = store.get(first).await.unwrap();
    assert_eq!(record.nickname, "renamed");
    assert_eq!(record.size, 42);
    assert!(record.last_accessed.is_some());

    assert_eq!(store.list().await.unwrap().len(), 2);
    store.delete(first).await.unwrap();
    assert!(store.get(first).await.unwrap_err().is_not_found());
    assert!(store.delete(first).await.unwrap_err().is_not_found());
}

async fn check_views<S: ViewStore>(store: &S) {
    let file_id = Uuid::new_v4();
    let id = store.create("weather", file_id, plots()).await.unwrap();

    let view = store.get(id).await.unwrap();
    assert_eq!(view.title, "weather");
    assert_eq!(view.file_id, file_id);
    assert_eq!(view.plot_settings, plots());

    let bad = vec![PlotSettings {
        x_column: String::new(),
        values: Vec::new(),
    }];
    assert!(matches!(
        store.create("bad", file_id, bad.clone()).await,
        Err(CoreError::ValidationFailed(_))
    ));
    let changes = ViewChanges {
        plot_settings: Some(bad),
        ..Default::default()
    };
    assert!(matches!(store.update(id, changes).await, Err(CoreError::ValidationFailed(_))));

    let changes = ViewChanges {
        title: Some("renamed".to_string()),
        ..Default::default()
    };
    store.update(id, changes).await.unwrap();
    let view = store.get(id).await.unwrap();
    assert_eq!(view.title, "renamed");
    assert_eq!(view.plot_settings, plots());

    assert_eq!(store.list_by_file(file_id).await.unwrap().len(), 1);
    assert!(store.list_by_file(Uuid::new_v4()).await.unwrap().is_empty());

    store.delete(id).await.unwrap();
    assert!(store.get(id).await.unwrap_err().is_not_found());
    assert!(store.list().await.unwrap().is_empty());
}

async fn check_zooms<S: ViewStore + ZoomStore>(store: &S) {
    let view_id = ViewStore::create(store, "weather", Uuid::new_v4(), plots()).await.unwrap();
    let sequence = ZoomPath::new(vec![ZoomWindow::Home, window(0.2, 0.8)]).unwrap();

    let zoom = ZoomStore::create(store, "spike", sequence.clone(), view_id).await.unwrap();
    let fetched = ZoomStore::get(store, zoom.id).await.unwrap();
    assert_eq!(fetched, zoom);
    assert_eq!(fetched.zoom_sequence, sequence);

    let orphan = ZoomStore::create(store, "orphan", ZoomPath::home(), Uuid::new_v4()).await;
    assert!(orphan.unwrap_err().is_not_found());

    let changes = ZoomChanges {
        title: Some("renamed".to_string()),
        zoom_sequence: Some(ZoomPath::new(vec![window(0.1, 0.2)]).unwrap()),
        view_id: None,
    };
    let updated = ZoomStore::update(store, zoom.id, changes).await.unwrap();
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.zoom_sequence.windows(), &[window(0.1, 0.2)]);
    assert_eq!(updated.view_id, view_id);

    assert_eq!(store.list_by_view(view_id).await.unwrap(), vec![updated]);
    ZoomStore::delete(store, zoom.id).await.unwrap();
    assert!(store.list_by_view(view_id).await.unwrap().is_empty());
    assert!(ZoomStore::delete(store, zoom.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_memory_store() {
    let store = MemoryStore::new();
    check_files(&store).await;
    check_views(&store).await;
    check_zooms(&store).await;
}

#[tokio::test]
async fn test_sqlite_store() {
    let store = SqliteStore::in_memory().unwrap();
    check_files(&store).await;
    check_views(&store).await;
    check_zooms(&store).await;
}

#[tokio::test]
async fn test_sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plots.db");

    let view_id = {
        let store = SqliteStore::open(&path).unwrap();
        ViewStore::create(&store, "weather", Uuid::new_v4(), plots()).await.unwrap()
    };

    let store = SqliteStore::open(&path).unwrap();
    let view = ViewStore::get(&store, view_id).await.unwrap();
    assert_eq!(view.plot_settings, plots());
}

#[tokio::test]
async fn test_app_state_activates_view() {
    let store = Arc::new(MemoryStore::new());
    let view_id = ViewStore::create(store.as_ref(), "weather", Uuid::new_v4(), plots()).await.unwrap();
    let view = ViewStore::get(store.as_ref(), view_id).await.unwrap();
    ZoomStore::create(store.as_ref(), "saved", ZoomPath::home(), view_id).await.unwrap();

    let state = AppState::new(store.clone(), ZoomSettings::default());
    let finished = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = finished.clone();
    state.events.subscribe::<SetupFinished, _>(move |e| sink.lock().push(e.view_id));

    state.tracker().on_user_brush(window(0.1, 0.5));
    state.on_setup_finished(view).await.unwrap();

    assert!(state.tracker().is_home());
    assert_eq!(state.zooms().len(), 1);
    assert_eq!(state.active_view().map(|v| v.id), Some(view_id));
    assert_eq!(finished.lock().as_slice(), [view_id]);

    state.tracker().on_user_brush(window(0.3, 0.6));
    let zoom = state.zooms().save_current("mine").await.unwrap();
    assert_eq!(zoom.zoom_sequence.windows(), &[window(0.3, 0.6)]);
    assert_eq!(store.list_by_view(view_id).await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_activating_view_stops_running_replay() {
    let store = Arc::new(MemoryStore::new());
    let old_id = ViewStore::create(store.as_ref(), "old", Uuid::new_v4(), plots()).await.unwrap();
    let new_id = ViewStore::create(store.as_ref(), "new", Uuid::new_v4(), plots()).await.unwrap();
    let sequence = ZoomPath::new(vec![window(0.1, 0.9), window(0.2, 0.8), window(0.3, 0.7)]).unwrap();
    let zoom_id = ZoomStore::create(store.as_ref(), "journey", sequence, old_id).await.unwrap().id;

    let state = Arc::new(AppState::new(store.clone(), ZoomSettings::default()));
    let old_view = ViewStore::get(store.as_ref(), old_id).await.unwrap();
    state.on_setup_finished(old_view).await.unwrap();

    let running = {
        let state = state.clone();
        tokio::spawn(async move { state.zooms().replay(zoom_id).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(state.tracker().state(), ZoomState::Replaying);

    let new_view = ViewStore::get(store.as_ref(), new_id).await.unwrap();
    state.on_setup_finished(new_view).await.unwrap();
    assert!(state.tracker().is_home());

    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome, ReplayOutcome::Superseded { steps: 1 });
    assert!(state.tracker().is_home());
    assert_eq!(state.tracker().active_zoom(), None);
    assert_eq!(state.zooms().view_id(), Some(new_id));
    assert!(state.zooms().is_empty());
}
