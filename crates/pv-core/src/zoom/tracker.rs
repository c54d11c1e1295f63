//! Zoom path tracker implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::RwLock;
use tracing::debug;

use super::{SelectionChange, SelectionOrigin, SelectionSubscriber, ZoomPath, ZoomWindow};
use crate::error::Result;
use crate::model::{SavedZoom, ViewId, ZoomId};
use crate::store::ZoomStore;

/// Coarse state of the chart viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomState {
    /// Full extent, path is `[null]`
    Home,
    /// At least one brushed window since the last reset
    Zoomed,
    /// A saved zoom is being replayed
    Replaying,
}

/// Tracker state stored internally
#[derive(Debug, Clone, Default)]
struct TrackerState {
    selection: ZoomWindow,
    /// Windows brushed since the last reset, never containing home
    log: Vec<ZoomWindow>,
    active_zoom: Option<ZoomId>,
    /// Generation of the replay currently driving the viewport
    replay: Option<u64>,
}

/// Records the viewport selections made on the current chart
pub struct ZoomPathTracker {
    state: Arc<RwLock<TrackerState>>,
    subscribers: Arc<RwLock<Vec<Weak<dyn SelectionSubscriber>>>>,
    generation: AtomicU64,
}

impl ZoomPathTracker {
    /// Create a tracker at the home state
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState::default())),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Handle a brush made by the user.
    ///
    /// A home window resets the path, any other window is appended to it.
    /// Returns false when a replay is driving the viewport and the brush was dropped.
    pub fn on_user_brush(&self, window: ZoomWindow) -> bool {
        let mut state = self.state.write();
        if let Some(generation) = state.replay {
            debug!(generation, "Ignoring brush while replay is active");
            return false;
        }

        state.selection = window;
        state.active_zoom = None;
        match window {
            ZoomWindow::Home => state.log.clear(),
            ZoomWindow::Range { .. } => state.log.push(window),
        }
        debug!(path_len = state.log.len(), ?window, "Selection changed");

        drop(state);
        self.notify_subscribers(SelectionOrigin::User);
        true
    }

    /// Return the chart to its full extent
    pub fn reset(&self) -> bool {
        self.on_user_brush(ZoomWindow::Home)
    }

    /// Zoom path accumulated since the last reset
    pub fn current_path(&self) -> ZoomPath {
        ZoomPath::from_log(&self.state.read().log)
    }

    /// Current live selection
    pub fn selection(&self) -> ZoomWindow {
        self.state.read().selection
    }

    pub fn is_home(&self) -> bool {
        self.state.read().selection.is_home()
    }

    pub fn state(&self) -> ZoomState {
        let state = self.state.read();
        if state.replay.is_some() {
            ZoomState::Replaying
        } else if state.selection.is_home() {
            ZoomState::Home
        } else {
            ZoomState::Zoomed
        }
    }

    /// Saved zoom the chart is currently showing, if any
    pub fn active_zoom(&self) -> Option<ZoomId> {
        self.state.read().active_zoom
    }

    /// Persist a snapshot of the current path; the path itself is left untouched
    pub async fn save_current_path(
        &self,
        store: &dyn ZoomStore,
        view_id: ViewId,
        name: &str,
    ) -> Result<SavedZoom> {
        let path = self.current_path();
        store.create(name, path, view_id).await
    }

    /// Add a subscriber
    pub fn subscribe(&self, subscriber: Arc<dyn SelectionSubscriber>) {
        let mut subscribers = self.subscribers.write();
        subscribers.push(Arc::downgrade(&subscriber));
    }

    /// Take over the viewport for a replay; any earlier replay is superseded.
    ///
    /// The viewport is handed back when the returned guard is dropped, even if
    /// the replay never reaches [`Self::finish_replay`].
    pub(crate) fn begin_replay(&self) -> ReplayGuard<'_> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().replay = Some(generation);
        ReplayGuard {
            tracker: self,
            generation,
        }
    }

    /// Stop whichever replay is driving the viewport.
    ///
    /// Selection and path are left where the replay put them. Returns false
    /// when no replay was active.
    pub(crate) fn cancel_replay(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let cancelled = self.state.write().replay.take();
        if let Some(generation) = cancelled {
            debug!(generation, "Cancelled replay");
        }
        cancelled.is_some()
    }

    /// Apply one replay step without recording it
    pub(crate) fn apply_replay_step(&self, generation: u64, window: ZoomWindow, zoom_id: ZoomId) -> bool {
        let mut state = self.state.write();
        if state.replay != Some(generation) {
            return false;
        }
        state.selection = window;
        state.active_zoom = Some(zoom_id);

        drop(state);
        self.notify_subscribers(SelectionOrigin::Replay { zoom_id });
        true
    }

    /// Hand the viewport back to the user, adopting the replayed path
    pub(crate) fn finish_replay(&self, generation: u64, sequence: &ZoomPath, zoom_id: ZoomId) -> bool {
        let mut state = self.state.write();
        if state.replay != Some(generation) {
            return false;
        }
        state.replay = None;
        state.selection = sequence.last();
        state.active_zoom = Some(zoom_id);
        state.log = sequence.since_last_reset();

        drop(state);
        self.notify_subscribers(SelectionOrigin::ReplayFinished { zoom_id });
        true
    }

    fn release_replay(&self, generation: u64) {
        let mut state = self.state.write();
        if state.replay == Some(generation) {
            state.replay = None;
            debug!(generation, "Replay dropped before finishing");
        }
    }

    /// Notify all subscribers of a selection change
    fn notify_subscribers(&self, origin: SelectionOrigin) {
        let change = {
            let state = self.state.read();
            SelectionChange {
                selection: state.selection,
                origin,
                path: ZoomPath::from_log(&state.log),
                active_zoom: state.active_zoom,
            }
        };

        let live: Vec<Arc<dyn SelectionSubscriber>> = {
            let mut subscribers = self.subscribers.write();
            // Remove any dead weak references
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        for subscriber in live {
            subscriber.on_selection_change(&change);
        }
    }
}

/// Holds the viewport for one replay generation
pub(crate) struct ReplayGuard<'a> {
    tracker: &'a ZoomPathTracker,
    generation: u64,
}

impl ReplayGuard<'_> {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release_replay(self.generation);
    }
}

impl Default for ZoomPathTracker {
    fn default() -> Self {
        Self::new()
    }
}
