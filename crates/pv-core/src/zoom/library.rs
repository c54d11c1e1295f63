//! Saved zooms of the active view

use std::sync::Arc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::{ReplayOutcome, ZoomPath, ZoomPathTracker, ZoomReplayEngine};
use crate::error::{CoreError, Result};
use crate::events::events::{ActiveZoomChanged, Notification, ZoomDeleted, ZoomSaved};
use crate::events::EventBus;
use crate::model::{SavedZoom, ViewId, ZoomChanges, ZoomId};
use crate::store::ZoomStore;

/// Client-side list of the saved zooms for the active view.
///
/// The local list only changes after the store confirms an operation. Failures are
/// reported on the event bus as danger notifications and returned to the caller.
pub struct ZoomLibrary {
    store: Arc<dyn ZoomStore>,
    engine: ZoomReplayEngine,
    events: Arc<EventBus>,
    view_id: RwLock<Option<ViewId>>,
    zooms: RwLock<IndexMap<ZoomId, SavedZoom>>,
}

impl ZoomLibrary {
    pub fn new(store: Arc<dyn ZoomStore>, engine: ZoomReplayEngine, events: Arc<EventBus>) -> Self {
        Self {
            store,
            engine,
            events,
            view_id: RwLock::new(None),
            zooms: RwLock::new(IndexMap::new()),
        }
    }

    pub fn tracker(&self) -> &Arc<ZoomPathTracker> {
        self.engine.tracker()
    }

    pub fn view_id(&self) -> Option<ViewId> {
        *self.view_id.read()
    }

    /// Replace the list with the zooms stored for `view_id`
    pub async fn load_for_view(&self, view_id: ViewId) -> Result<usize> {
        let zooms = self
            .store
            .list_by_view(view_id)
            .await
            .map_err(|e| self.report("Couldn't load zooms from server.", e))?;

        let count = zooms.len();
        *self.view_id.write() = Some(view_id);
        *self.zooms.write() = zooms.into_iter().map(|z| (z.id, z)).collect();
        info!(%view_id, count, "Loaded zooms");
        Ok(count)
    }

    /// Persist the tracker's current path under `name`
    pub async fn save_current(&self, name: &str) -> Result<SavedZoom> {
        let view_id = self.require_view()?;
        let zoom = self
            .tracker()
            .save_current_path(self.store.as_ref(), view_id, name)
            .await
            .map_err(|e| self.report("Couldn't save new zoom on server.", e))?;

        self.zooms.write().insert(zoom.id, zoom.clone());
        self.events.publish(ZoomSaved { zoom_id: zoom.id });
        Ok(zoom)
    }

    pub async fn rename(&self, id: ZoomId, title: &str) -> Result<SavedZoom> {
        let changes = ZoomChanges {
            title: Some(title.to_string()),
            ..Default::default()
        };
        self.update(id, changes).await
    }

    /// Overwrite the stored sequence of a zoom
    pub async fn update_sequence(&self, id: ZoomId, sequence: ZoomPath) -> Result<SavedZoom> {
        let changes = ZoomChanges {
            zoom_sequence: Some(sequence),
            ..Default::default()
        };
        self.update(id, changes).await
    }

    pub async fn delete(&self, id: ZoomId) -> Result<()> {
        self.store
            .delete(id)
            .await
            .map_err(|e| self.report("Couldn't delete zoom.", e))?;

        self.zooms.write().shift_remove(&id);
        self.events.publish(ZoomDeleted { zoom_id: id });
        if self.tracker().active_zoom() == Some(id) {
            self.events.publish(ActiveZoomChanged { zoom_id: None });
        }
        Ok(())
    }

    pub fn get(&self, id: ZoomId) -> Option<SavedZoom> {
        self.zooms.read().get(&id).cloned()
    }

    /// Zooms in the order they were loaded or saved
    pub fn zooms(&self) -> Vec<SavedZoom> {
        self.zooms.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.zooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.zooms.read().is_empty()
    }

    /// Replay one of the listed zooms on the chart
    pub async fn replay(&self, id: ZoomId) -> Result<ReplayOutcome> {
        let zoom = self
            .get(id)
            .ok_or_else(|| CoreError::not_found("zoom", id))?;

        self.events.publish(ActiveZoomChanged { zoom_id: Some(id) });
        Ok(self.engine.replay(&zoom).await)
    }

    /// Drop the list, e.g. when a new view is being set up
    pub fn clear(&self) {
        *self.view_id.write() = None;
        self.zooms.write().clear();
    }

    async fn update(&self, id: ZoomId, changes: ZoomChanges) -> Result<SavedZoom> {
        let zoom = self
            .store
            .update(id, changes)
            .await
            .map_err(|e| self.report("Couldn't update zoom on server.", e))?;

        self.zooms.write().insert(zoom.id, zoom.clone());
        Ok(zoom)
    }

    fn require_view(&self) -> Result<ViewId> {
        self.view_id().ok_or_else(|| {
            CoreError::ValidationFailed("no view is active".to_string())
        })
    }

    fn report(&self, message: &str, error: CoreError) -> CoreError {
        warn!(%error, "{message}");
        self.events.publish(Notification::danger(message));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zoom::ZoomWindow;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    /// Minimal store that can be told to fail
    #[derive(Default)]
    struct FlakyStore {
        zooms: Mutex<IndexMap<ZoomId, SavedZoom>>,
        failing: Mutex<bool>,
    }

    impl FlakyStore {
        fn check(&self) -> Result<()> {
            if *self.failing.lock() {
                Err(CoreError::Storage("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ZoomStore for FlakyStore {
        async fn create(&self, title: &str, sequence: ZoomPath, view_id: ViewId) -> Result<SavedZoom> {
            self.check()?;
            let zoom = SavedZoom {
                id: Uuid::new_v4(),
                title: title.to_string(),
                zoom_sequence: sequence,
                view_id,
            };
            self.zooms.lock().insert(zoom.id, zoom.clone());
            Ok(zoom)
        }

        async fn get(&self, id: ZoomId) -> Result<SavedZoom> {
            self.check()?;
            self.zooms
                .lock()
                .get(&id)
                .cloned()
                .ok_or_else(|| CoreError::not_found("zoom", id))
        }

        async fn list_by_view(&self, view_id: ViewId) -> Result<Vec<SavedZoom>> {
            self.check()?;
            Ok(self
                .zooms
                .lock()
                .values()
                .filter(|z| z.view_id == view_id)
                .cloned()
                .collect())
        }

        async fn update(&self, id: ZoomId, changes: ZoomChanges) -> Result<SavedZoom> {
            self.check()?;
            let mut zooms = self.zooms.lock();
            let zoom = zooms
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found("zoom", id))?;
            changes.apply_to(zoom);
            Ok(zoom.clone())
        }

        async fn delete(&self, id: ZoomId) -> Result<()> {
            self.check()?;
            self.zooms
                .lock()
                .shift_remove(&id)
                .map(|_| ())
                .ok_or_else(|| CoreError::not_found("zoom", id))
        }
    }

    fn library(store: Arc<FlakyStore>) -> (ZoomLibrary, Arc<EventBus>) {
        let tracker = Arc::new(ZoomPathTracker::new());
        let engine = ZoomReplayEngine::with_step_delay(tracker, Duration::from_millis(10));
        let events = Arc::new(EventBus::new());
        (ZoomLibrary::new(store, engine, events.clone()), events)
    }

    fn window(start: f64, end: f64) -> ZoomWindow {
        ZoomWindow::range(start, end).unwrap()
    }

    #[tokio::test]
    async fn test_save_snapshots_without_resetting() {
        let store = Arc::new(FlakyStore::default());
        let (library, _events) = library(store.clone());
        let view_id = Uuid::new_v4();
        library.load_for_view(view_id).await.unwrap();

        library.tracker().on_user_brush(window(0.2, 0.8));
        let zoom = library.save_current("first").await.unwrap();

        assert_eq!(zoom.view_id, view_id);
        assert_eq!(zoom.zoom_sequence.windows(), &[window(0.2, 0.8)]);
        assert_eq!(library.tracker().current_path(), zoom.zoom_sequence);
        assert_eq!(library.zooms().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_notify_and_leave_list_untouched() {
        let store = Arc::new(FlakyStore::default());
        let (library, events) = library(store.clone());
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        events.subscribe::<Notification, _>(move |n| sink.lock().push(n.message.clone()));

        library.load_for_view(Uuid::new_v4()).await.unwrap();
        let zoom = library.save_current("kept").await.unwrap();

        *store.failing.lock() = true;
        assert!(library.save_current("lost").await.is_err());
        assert!(library.rename(zoom.id, "renamed").await.is_err());
        assert!(library.delete(zoom.id).await.is_err());

        assert_eq!(library.zooms(), vec![zoom]);
        assert_eq!(
            messages.lock().as_slice(),
            [
                "Couldn't save new zoom on server.",
                "Couldn't update zoom on server.",
                "Couldn't delete zoom.",
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_update_delete() {
        let store = Arc::new(FlakyStore::default());
        let (library, _events) = library(store.clone());
        library.load_for_view(Uuid::new_v4()).await.unwrap();
        let zoom = library.save_current("").await.unwrap();

        let renamed = library.rename(zoom.id, "spike").await.unwrap();
        assert_eq!(renamed.title, "spike");

        let sequence = ZoomPath::new(vec![ZoomWindow::Home, window(0.5, 0.6)]).unwrap();
        let updated = library.update_sequence(zoom.id, sequence.clone()).await.unwrap();
        assert_eq!(updated.zoom_sequence, sequence);
        assert_eq!(library.get(zoom.id).unwrap().zoom_sequence, sequence);

        library.delete(zoom.id).await.unwrap();
        assert!(library.is_empty());
    }

    #[tokio::test]
    async fn test_replay_unknown_zoom_is_not_found() {
        let (library, _events) = library(Arc::new(FlakyStore::default()));
        let err = library.replay(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_save_requires_active_view() {
        let (library, _events) = library(Arc::new(FlakyStore::default()));
        assert!(matches!(
            library.save_current("x").await,
            Err(CoreError::ValidationFailed(_))
        ));
    }
}
