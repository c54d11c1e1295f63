//! Selection subscriber trait

use super::{ZoomPath, ZoomWindow};
use crate::model::ZoomId;

/// Who moved the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    /// A brush or reset by the user
    User,
    /// A replay step of a saved zoom
    Replay { zoom_id: ZoomId },
    /// A replay completed and its path became the recorded path; the selection
    /// is the one set by the last replay step
    ReplayFinished { zoom_id: ZoomId },
}

/// Payload of a `SelectionChanged` notification
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChange {
    pub selection: ZoomWindow,
    pub origin: SelectionOrigin,
    /// Zoom path recorded since the last reset
    pub path: ZoomPath,
    pub active_zoom: Option<ZoomId>,
}

/// Trait for components that redraw or persist when the viewport selection changes
pub trait SelectionSubscriber: Send + Sync {
    /// Called after every selection change, in the order changes happen
    fn on_selection_change(&self, change: &SelectionChange);
}
