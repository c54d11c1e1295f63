//! Request-independent operations behind the HTTP routes

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use chrono::Utc;
use pv_core::{
    CoreError, FileId, FileRecord, FileStore, NewFile, PlotSettings, Result, SavedZoom, View,
    ViewChanges, ViewId, ViewStore, ZoomChanges, ZoomId, ZoomPath, ZoomSettings, ZoomStore,
};
use pv_data::{CsvSeriesExtractor, Series, TransformRegistry};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// An uploaded file as received
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

/// One course of a view with its values resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseValues {
    #[serde(rename = "xColumn")]
    pub x_column: String,
    #[serde(rename = "yColumn")]
    pub y_column: String,
    pub func: String,
    pub values: Series,
    pub color: String,
}

/// Record stores shared by the service
#[derive(Clone)]
pub struct Stores {
    pub files: Arc<dyn FileStore>,
    pub views: Arc<dyn ViewStore>,
    pub zooms: Arc<dyn ZoomStore>,
}

impl Stores {
    /// Use one backend for every record kind
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: FileStore + ViewStore + ZoomStore + 'static,
    {
        Self {
            files: backend.clone(),
            views: backend.clone(),
            zooms: backend,
        }
    }
}

/// Files, views, zooms and series extraction
pub struct PlotService {
    stores: Stores,
    extractor: CsvSeriesExtractor,
    transforms: TransformRegistry,
    csv_dir: PathBuf,
    csv_mimetype: String,
    zoom_settings: ZoomSettings,
}

impl PlotService {
    pub fn new(
        stores: Stores,
        extractor: CsvSeriesExtractor,
        csv_dir: impl Into<PathBuf>,
        csv_mimetype: impl Into<String>,
    ) -> Self {
        Self {
            stores,
            extractor,
            transforms: TransformRegistry::standard(),
            csv_dir: csv_dir.into(),
            csv_mimetype: csv_mimetype.into(),
            zoom_settings: ZoomSettings::default(),
        }
    }

    pub fn with_zoom_settings(mut self, settings: ZoomSettings) -> Self {
        self.zoom_settings = settings;
        self
    }

    pub fn zoom_settings(&self) -> &ZoomSettings {
        &self.zoom_settings
    }

    // Series

    /// Series for two columns of a file, transformed when `func` is registered
    pub async fn values(&self, file_id: FileId, x_column: &str, y_column: &str, func: Option<&str>) -> Result<Series> {
        let path = self.csv_path(file_id).await?;
        let series = self.extractor.extract_series(&path, x_column, y_column).await?;
        Ok(self.transform(func, series))
    }

    pub async fn headers(&self, file_id: FileId) -> Result<Vec<String>> {
        let path = self.csv_path(file_id).await?;
        Ok(self.extractor.list_columns(&path).await?)
    }

    pub fn functions(&self) -> Vec<&'static str> {
        self.transforms.names()
    }

    /// Every course of every plot of a view, with values, from one pass over the CSV
    pub async fn values_from_view(&self, view_id: ViewId) -> Result<Vec<Vec<CourseValues>>> {
        let view = self.stores.views.get(view_id).await?;
        let path = self.csv_path(view.file_id).await?;

        let pairs: Vec<(String, String)> = view
            .plot_settings
            .iter()
            .flat_map(|plot| {
                plot.values
                    .iter()
                    .map(move |course| (plot.x_column.clone(), course.y_column.clone()))
            })
            .collect();
        let mut extracted = self.extractor.extract_series_set(&path, pairs).await?.into_iter();

        let mut plots = Vec::with_capacity(view.plot_settings.len());
        for plot in &view.plot_settings {
            let mut courses = Vec::with_capacity(plot.values.len());
            for course in &plot.values {
                let series = extracted.next().unwrap_or_default();
                courses.push(CourseValues {
                    x_column: plot.x_column.clone(),
                    y_column: course.y_column.clone(),
                    func: course.func.clone(),
                    values: self.transform(course.transform(), series),
                    color: course.color.clone(),
                });
            }
            plots.push(courses);
        }
        debug!(%view_id, plots = plots.len(), "Resolved view values");
        Ok(plots)
    }

    fn transform(&self, func: Option<&str>, series: Series) -> Series {
        match func.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) if self.transforms.contains(name) => self.transforms.apply(name, &series),
            _ => series,
        }
    }

    // Files

    /// Store an uploaded CSV file, reusing an identical earlier upload.
    ///
    /// The duplicate check and the insert are separate steps; two identical
    /// uploads racing each other can both be stored.
    pub async fn upload(&self, upload: Upload) -> Result<FileId> {
        if upload.mimetype != self.csv_mimetype {
            warn!(name = %upload.name, mimetype = %upload.mimetype, "Rejected upload");
            return Err(CoreError::MalformedInput("Wrong file provided.".to_string()));
        }

        let md5 = format!("{:x}", md5::compute(&upload.bytes));
        for existing in self.stores.files.find_by_md5_and_mimetype(&md5, &upload.mimetype).await? {
            if self.heal(&existing).await?.is_some() {
                info!(file_id = %existing.id, "Upload matches stored file");
                return Ok(existing.id);
            }
        }

        tokio::fs::create_dir_all(&self.csv_dir).await.map_err(io_error)?;
        let filename = self.write_new_file(&upload.bytes).await?;
        let id = self
            .stores
            .files
            .save(NewFile {
                nickname: upload.name,
                filename: filename.clone(),
                mimetype: upload.mimetype,
                md5,
                size: upload.bytes.len() as u64,
            })
            .await?;
        info!(file_id = %id, %filename, size = upload.bytes.len(), "Stored upload");
        Ok(id)
    }

    /// Write under a timestamp name, suffixed when that name is taken
    async fn write_new_file(&self, bytes: &[u8]) -> Result<String> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        for attempt in 0u32.. {
            let filename = match attempt {
                0 => format!("{stamp}.csv"),
                n => format!("{stamp}-{n}.csv"),
            };
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.csv_dir.join(&filename))
                .await;
            match file {
                Ok(mut file) => {
                    file.write_all(bytes).await.map_err(io_error)?;
                    file.flush().await.map_err(io_error)?;
                    return Ok(filename);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_error(e)),
            }
        }
        Err(CoreError::Storage("no free file name".to_string()))
    }

    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        let mut files = Vec::new();
        for file in self.stores.files.list().await? {
            if let Some(file) = self.heal(&file).await? {
                files.push(file);
            }
        }
        Ok(files)
    }

    pub async fn get_file(&self, id: FileId) -> Result<FileRecord> {
        let file = self.stores.files.get(id).await?;
        self.heal(&file)
            .await?
            .ok_or_else(|| CoreError::not_found("file", id))
    }

    pub async fn rename_file(&self, id: FileId, nickname: &str) -> Result<()> {
        self.stores.files.rename(id, nickname).await
    }

    /// Remove a file with its views and their zooms
    pub async fn delete_file(&self, id: FileId) -> Result<()> {
        let file = self.stores.files.get(id).await?;
        self.delete_views_of(id).await?;
        self.stores.files.delete(id).await?;

        match tokio::fs::remove_file(self.csv_dir.join(&file.filename)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(e)),
        }
        info!(file_id = %id, "Deleted file");
        Ok(())
    }

    async fn delete_views_of(&self, file_id: FileId) -> Result<()> {
        for view in self.stores.views.list_by_file(file_id).await? {
            match self.delete_view(view.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Path of the stored CSV; the record is dropped when the file is gone
    async fn csv_path(&self, id: FileId) -> Result<PathBuf> {
        let file = self.stores.files.get(id).await?;
        let file = self
            .heal(&file)
            .await?
            .ok_or_else(|| CoreError::not_found("file", id))?;
        self.stores.files.touch(id, Utc::now()).await?;
        Ok(self.csv_dir.join(file.filename))
    }

    /// `None` after deleting a record whose CSV no longer exists, along with
    /// the views and zooms built on it
    async fn heal(&self, file: &FileRecord) -> Result<Option<FileRecord>> {
        let path = self.csv_dir.join(&file.filename);
        if tokio::fs::try_exists(&path).await.map_err(io_error)? {
            return Ok(Some(file.clone()));
        }

        warn!(file_id = %file.id, path = %path.display(), "CSV missing on disk, dropping record");
        self.delete_views_of(file.id).await?;
        match self.stores.files.delete(file.id).await {
            Ok(()) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // Views

    pub async fn list_views(&self) -> Result<Vec<View>> {
        self.stores.views.list().await
    }

    pub async fn views_for_file(&self, file_id: FileId) -> Result<Vec<View>> {
        self.stores.views.list_by_file(file_id).await
    }

    pub async fn get_view(&self, id: ViewId) -> Result<View> {
        self.stores.views.get(id).await
    }

    pub async fn add_view(&self, title: &str, file_id: FileId, plot_settings: Vec<PlotSettings>) -> Result<ViewId> {
        self.stores.files.get(file_id).await?;
        let id = self.stores.views.create(title, file_id, plot_settings).await?;
        info!(view_id = %id, %file_id, "Created view");
        Ok(id)
    }

    pub async fn edit_view(&self, id: ViewId, changes: ViewChanges) -> Result<ViewId> {
        if let Some(file_id) = changes.file_id {
            self.stores.files.get(file_id).await?;
        }
        if !changes.is_empty() {
            self.stores.views.update(id, changes).await?;
        } else {
            self.stores.views.get(id).await?;
        }
        Ok(id)
    }

    /// Delete a view and every zoom saved against it
    pub async fn delete_view(&self, id: ViewId) -> Result<()> {
        self.stores.views.get(id).await?;
        for zoom in self.stores.zooms.list_by_view(id).await? {
            self.stores.zooms.delete(zoom.id).await?;
        }
        self.stores.views.delete(id).await?;
        info!(view_id = %id, "Deleted view");
        Ok(())
    }

    // Zooms

    pub async fn zooms_for_view(&self, view_id: ViewId) -> Result<Vec<SavedZoom>> {
        self.stores.zooms.list_by_view(view_id).await
    }

    pub async fn add_zoom(&self, title: &str, sequence: ZoomPath, view_id: ViewId) -> Result<SavedZoom> {
        self.stores.views.get(view_id).await?;
        self.stores.zooms.create(title, sequence, view_id).await
    }

    pub async fn update_zoom(&self, id: ZoomId, changes: ZoomChanges) -> Result<SavedZoom> {
        if let Some(view_id) = changes.view_id {
            self.stores.views.get(view_id).await?;
        }
        if changes.is_empty() {
            return self.stores.zooms.get(id).await;
        }
        self.stores.zooms.update(id, changes).await
    }

    pub async fn delete_zoom(&self, id: ZoomId) -> Result<()> {
        self.stores.zooms.delete(id).await
    }
}

fn io_error(error: io::Error) -> CoreError {
    CoreError::Storage(error.to_string())
}
