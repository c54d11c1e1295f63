//! Step-by-step replay of saved zoom sequences

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{ZoomPath, ZoomPathTracker, ZoomWindow};
use crate::model::SavedZoom;

/// Default pause between two replay steps
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(300);

/// How a replay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every planned step was applied
    Completed { steps: usize },
    /// A newer replay took over after `steps` steps
    Superseded { steps: usize },
}

impl ReplayOutcome {
    pub fn steps(&self) -> usize {
        match self {
            ReplayOutcome::Completed { steps } | ReplayOutcome::Superseded { steps } => *steps,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ReplayOutcome::Completed { .. })
    }
}

/// Drives the tracker through a saved zoom sequence
pub struct ZoomReplayEngine {
    tracker: Arc<ZoomPathTracker>,
    step_delay: Duration,
}

impl ZoomReplayEngine {
    pub fn new(tracker: Arc<ZoomPathTracker>) -> Self {
        Self::with_step_delay(tracker, DEFAULT_STEP_DELAY)
    }

    pub fn with_step_delay(tracker: Arc<ZoomPathTracker>, step_delay: Duration) -> Self {
        Self { tracker, step_delay }
    }

    pub fn tracker(&self) -> &Arc<ZoomPathTracker> {
        &self.tracker
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Windows that will be applied for `sequence`.
    ///
    /// A leading home window is dropped when the chart already shows the full extent.
    pub fn plan(sequence: &ZoomPath, at_home: bool) -> Vec<ZoomWindow> {
        let skip = usize::from(at_home && sequence.first().is_home());
        sequence.iter().skip(skip).copied().collect()
    }

    /// Replay a saved zoom, superseding any replay still in flight.
    ///
    /// Dropping the returned future hands the viewport back to the user with the
    /// selection of the last applied step.
    pub async fn replay(&self, zoom: &SavedZoom) -> ReplayOutcome {
        let plan = Self::plan(&zoom.zoom_sequence, self.tracker.is_home());
        let steps = plan.len();
        let guard = self.tracker.begin_replay();
        let generation = guard.generation();
        info!(zoom_id = %zoom.id, steps, "Replaying zoom");

        for (idx, window) in plan.into_iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.step_delay).await;
            }
            if !self.tracker.apply_replay_step(generation, window, zoom.id) {
                debug!(zoom_id = %zoom.id, generation, applied = idx, "Replay superseded");
                return ReplayOutcome::Superseded { steps: idx };
            }
        }

        if self.tracker.finish_replay(generation, &zoom.zoom_sequence, zoom.id) {
            ReplayOutcome::Completed { steps }
        } else {
            ReplayOutcome::Superseded { steps }
        }
    }
}
