//! Zoom state machine: viewport windows, path tracking, replay and saved zooms

mod library;
mod replay;
mod subscriber;
mod tracker;
mod window;

pub use library::ZoomLibrary;
pub use replay::{ReplayOutcome, ZoomReplayEngine, DEFAULT_STEP_DELAY};
pub use subscriber::{SelectionChange, SelectionOrigin, SelectionSubscriber};
pub use tracker::{ZoomPathTracker, ZoomState};
pub use window::{ZoomPath, ZoomWindow};
