//! In-memory store, insertion ordered

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use pv_core::model::validate_plot_settings;
use pv_core::{
    CoreError, FileId, FileRecord, FileStore, NewFile, PlotSettings, Result, SavedZoom, View,
    ViewChanges, ViewId, ViewStore, ZoomChanges, ZoomId, ZoomPath, ZoomStore,
};
use uuid::Uuid;

/// Store keeping every record in process memory
#[derive(Default)]
pub struct MemoryStore {
    files: RwLock<IndexMap<FileId, FileRecord>>,
    views: RwLock<IndexMap<ViewId, View>>,
    zooms: RwLock<IndexMap<ZoomId, SavedZoom>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn save(&self, file: NewFile) -> Result<FileId> {
        let id = Uuid::new_v4();
        let record = FileRecord::from_new(id, file, Utc::now());
        self.files.write().insert(id, record);
        Ok(id)
    }

    async fn find_by_md5_and_mimetype(&self, md5: &str, mimetype: &str) -> Result<Vec<FileRecord>> {
        Ok(self
            .files
            .read()
            .values()
            .filter(|f| f.md5 == md5 && f.mimetype == mimetype)
            .cloned()
            .collect())
    }

    async fn get(&self, id: FileId) -> Result<FileRecord> {
        self.files
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("file", id))
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        Ok(self.files.read().values().cloned().collect())
    }

    async fn delete(&self, id: FileId) -> Result<()> {
        self.files
            .write()
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("file", id))
    }

    async fn rename(&self, id: FileId, nickname: &str) -> Result<()> {
        let mut files = self.files.write();
        let file = files.get_mut(&id).ok_or_else(|| CoreError::not_found("file", id))?;
        file.nickname = nickname.to_string();
        Ok(())
    }

    async fn touch(&self, id: FileId, at: DateTime<Utc>) -> Result<()> {
        let mut files = self.files.write();
        let file = files.get_mut(&id).ok_or_else(|| CoreError::not_found("file", id))?;
        file.last_accessed = Some(at);
        Ok(())
    }
}

#[async_trait]
impl ViewStore for MemoryStore {
    async fn create(&self, title: &str, file_id: FileId, plot_settings: Vec<PlotSettings>) -> Result<ViewId> {
        validate_plot_settings(&plot_settings)?;
        let id = Uuid::new_v4();
        let view = View {
            id,
            title: title.to_string(),
            file_id,
            plot_settings,
        };
        self.views.write().insert(id, view);
        Ok(id)
    }

    async fn get(&self, id: ViewId) -> Result<View> {
        self.views
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("view", id))
    }

    async fn list(&self) -> Result<Vec<View>> {
        Ok(self.views.read().values().cloned().collect())
    }

    async fn list_by_file(&self, file_id: FileId) -> Result<Vec<View>> {
        Ok(self
            .views
            .read()
            .values()
            .filter(|v| v.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: ViewId, changes: ViewChanges) -> Result<()> {
        changes.validate()?;
        let mut views = self.views.write();
        let view = views.get_mut(&id).ok_or_else(|| CoreError::not_found("view", id))?;
        changes.apply_to(view);
        Ok(())
    }

    async fn delete(&self, id: ViewId) -> Result<()> {
        self.views
            .write()
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("view", id))
    }
}

#[async_trait]
impl ZoomStore for MemoryStore {
    async fn create(&self, title: &str, sequence: ZoomPath, view_id: ViewId) -> Result<SavedZoom> {
        if !self.views.read().contains_key(&view_id) {
            return Err(CoreError::not_found("view", view_id));
        }
        let zoom = SavedZoom {
            id: Uuid::new_v4(),
            title: title.to_string(),
            zoom_sequence: sequence,
            view_id,
        };
        self.zooms.write().insert(zoom.id, zoom.clone());
        Ok(zoom)
    }

    async fn get(&self, id: ZoomId) -> Result<SavedZoom> {
        self.zooms
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("zoom", id))
    }

    async fn list_by_view(&self, view_id: ViewId) -> Result<Vec<SavedZoom>> {
        Ok(self
            .zooms
            .read()
            .values()
            .filter(|z| z.view_id == view_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: ZoomId, changes: ZoomChanges) -> Result<SavedZoom> {
        if let Some(view_id) = changes.view_id {
            if !self.views.read().contains_key(&view_id) {
                return Err(CoreError::not_found("view", view_id));
            }
        }
        let mut zooms = self.zooms.write();
        let zoom = zooms.get_mut(&id).ok_or_else(|| CoreError::not_found("zoom", id))?;
        changes.apply_to(zoom);
        Ok(zoom.clone())
    }

    async fn delete(&self, id: ZoomId) -> Result<()> {
        self.zooms
            .write()
            .shift_remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("zoom", id))
    }
}
