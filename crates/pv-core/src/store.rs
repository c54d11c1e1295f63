//! Persistence collaborators consumed by the core
//!
//! Implementations live in `pv-store`; everything here is a black box to the
//! extraction pipeline and the zoom state machine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    FileId, FileRecord, NewFile, PlotSettings, SavedZoom, View, ViewChanges, ViewId, ZoomChanges,
    ZoomId,
};
use crate::zoom::ZoomPath;

/// Metadata of uploaded files
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store metadata for a new file and return its id
    async fn save(&self, file: NewFile) -> Result<FileId>;

    /// Files with the same content digest and mimetype
    async fn find_by_md5_and_mimetype(&self, md5: &str, mimetype: &str) -> Result<Vec<FileRecord>>;

    async fn get(&self, id: FileId) -> Result<FileRecord>;

    async fn list(&self) -> Result<Vec<FileRecord>>;

    async fn delete(&self, id: FileId) -> Result<()>;

    async fn rename(&self, id: FileId, nickname: &str) -> Result<()>;

    /// Record an access to the file
    async fn touch(&self, id: FileId, at: DateTime<Utc>) -> Result<()>;
}

/// Saved views
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn create(&self, title: &str, file_id: FileId, plot_settings: Vec<PlotSettings>) -> Result<ViewId>;

    async fn get(&self, id: ViewId) -> Result<View>;

    async fn list(&self) -> Result<Vec<View>>;

    async fn list_by_file(&self, file_id: FileId) -> Result<Vec<View>>;

    async fn update(&self, id: ViewId, changes: ViewChanges) -> Result<()>;

    async fn delete(&self, id: ViewId) -> Result<()>;
}

/// Saved zooms
#[async_trait]
pub trait ZoomStore: Send + Sync {
    async fn create(&self, title: &str, sequence: ZoomPath, view_id: ViewId) -> Result<SavedZoom>;

    async fn get(&self, id: ZoomId) -> Result<SavedZoom>;

    async fn list_by_view(&self, view_id: ViewId) -> Result<Vec<SavedZoom>>;

    /// Apply changes and return the updated zoom
    async fn update(&self, id: ZoomId, changes: ZoomChanges) -> Result<SavedZoom>;

    async fn delete(&self, id: ZoomId) -> Result<()>;
}
