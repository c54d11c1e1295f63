//! Core functionality for the plot viewer
//!
//! This crate provides the data model, the persistence seams and the
//! client-side zoom state machine shared by the server and the chart.

pub mod error;
pub mod events;
pub mod model;
pub mod state;
pub mod store;
pub mod wizard;
pub mod zoom;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use events::{Event, EventBus};
pub use model::{
    Course, FileId, FileRecord, NewFile, PlotSettings, SavedZoom, View, ViewChanges, ViewId,
    ZoomChanges, ZoomId,
};
pub use state::{AppState, ZoomSettings};
pub use store::{FileStore, ViewStore, ZoomStore};
pub use wizard::{SetupOutcome, SetupWizard, WizardStep};
pub use zoom::{
    ReplayOutcome, SelectionChange, SelectionOrigin, SelectionSubscriber, ZoomLibrary, ZoomPath,
    ZoomPathTracker, ZoomReplayEngine, ZoomState, ZoomWindow,
};
