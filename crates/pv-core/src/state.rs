//! Application state management

use std::sync::Arc;
use std::time::Duration;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::events::events::{SetupFinished, SetupNeeded};
use crate::events::EventBus;
use crate::model::View;
use crate::store::ZoomStore;
use crate::zoom::{ZoomLibrary, ZoomPathTracker, ZoomReplayEngine};

/// Client-side zoom settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomSettings {
    /// Pause between two replay steps, in milliseconds
    pub replay_step_delay_ms: u64,
}

impl ZoomSettings {
    pub fn replay_step_delay(&self) -> Duration {
        Duration::from_millis(self.replay_step_delay_ms)
    }
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            replay_step_delay_ms: 300,
        }
    }
}

/// Application-wide state of one chart session
///
/// Owns the tracker, the saved-zoom library and the event bus that the
/// chart, the zoom list and the setup wizard communicate through.
pub struct AppState {
    pub settings: ZoomSettings,
    pub events: Arc<EventBus>,
    tracker: Arc<ZoomPathTracker>,
    zooms: ZoomLibrary,
    active_view: RwLock<Option<View>>,
}

impl AppState {
    pub fn new(store: Arc<dyn ZoomStore>, settings: ZoomSettings) -> Self {
        let events = Arc::new(EventBus::new());
        let tracker = Arc::new(ZoomPathTracker::new());
        let engine = ZoomReplayEngine::with_step_delay(tracker.clone(), settings.replay_step_delay());
        let zooms = ZoomLibrary::new(store, engine, events.clone());

        Self {
            settings,
            events,
            tracker,
            zooms,
            active_view: RwLock::new(None),
        }
    }

    pub fn tracker(&self) -> &Arc<ZoomPathTracker> {
        &self.tracker
    }

    pub fn zooms(&self) -> &ZoomLibrary {
        &self.zooms
    }

    pub fn active_view(&self) -> Option<View> {
        self.active_view.read().clone()
    }

    /// Switch the chart to `view`: reset the viewport and load its zooms
    pub async fn on_setup_finished(&self, view: View) -> Result<()> {
        let view_id = view.id;
        let file_id = view.file_id;
        info!(%view_id, title = %view.title, "Activating view");

        if self.tracker.cancel_replay() {
            debug!(%view_id, "Stopped replay of the previous view");
        }
        if !self.tracker.reset() {
            return Err(CoreError::ValidationFailed(
                "viewport is still replaying a zoom".to_string(),
            ));
        }

        *self.active_view.write() = Some(view);
        self.zooms.clear();
        self.zooms.load_for_view(view_id).await?;

        self.events.publish(SetupFinished {
            view_id,
            file_id: Some(file_id),
        });
        Ok(())
    }

    /// Ask for the setup wizard to be shown again
    pub fn request_setup(&self) {
        self.events.publish(SetupNeeded);
    }
}
