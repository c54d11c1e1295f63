//! Persisted records: uploaded files, views and saved zooms
//!
//! Field names follow the wire format the browser client already speaks
//! (`_id`, `fileID`, `plotSettings`, ...), so records can be sent as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::zoom::ZoomPath;

/// Unique identifier for an uploaded file
pub type FileId = Uuid;

/// Unique identifier for a view
pub type ViewId = Uuid;

/// Unique identifier for a saved zoom
pub type ZoomId = Uuid;

/// Metadata of an uploaded CSV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: FileId,

    /// User-facing name
    #[serde(default)]
    pub nickname: String,

    /// Name of the stored file inside the CSV folder
    pub filename: String,

    pub mimetype: String,

    /// Hex digest of the uploaded content
    pub md5: String,

    pub size: u64,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Metadata for a file that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewFile {
    pub nickname: String,
    pub filename: String,
    pub mimetype: String,
    pub md5: String,
    pub size: u64,
}

impl FileRecord {
    pub fn from_new(id: FileId, new: NewFile, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            nickname: new.nickname,
            filename: new.filename,
            mimetype: new.mimetype,
            md5: new.md5,
            size: new.size,
            created_at,
            last_accessed: None,
        }
    }
}

/// One Y series of a plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "yColumn")]
    pub y_column: String,

    /// Transform name; empty means none
    #[serde(default)]
    pub func: String,

    #[serde(default)]
    pub color: String,
}

impl Course {
    pub fn new(y_column: impl Into<String>, func: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            y_column: y_column.into(),
            func: func.into(),
            color: color.into(),
        }
    }

    /// The transform to apply, if any
    pub fn transform(&self) -> Option<&str> {
        let func = self.func.trim();
        (!func.is_empty()).then_some(func)
    }
}

/// One plot of a view: a shared X column and its Y courses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSettings {
    #[serde(rename = "xColumn")]
    pub x_column: String,

    #[serde(default)]
    pub values: Vec<Course>,
}

/// Saved combination of columns and transforms over one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    #[serde(rename = "_id")]
    pub id: ViewId,

    #[serde(default)]
    pub title: String,

    #[serde(rename = "fileID")]
    pub file_id: FileId,

    #[serde(rename = "plotSettings", default)]
    pub plot_settings: Vec<PlotSettings>,
}

/// Partial update of a view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewChanges {
    pub title: Option<String>,
    pub file_id: Option<FileId>,
    pub plot_settings: Option<Vec<PlotSettings>>,
}

impl ViewChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.file_id.is_none() && self.plot_settings.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.plot_settings {
            Some(plots) => validate_plot_settings(plots),
            None => Ok(()),
        }
    }

    pub fn apply_to(self, view: &mut View) {
        if let Some(title) = self.title {
            view.title = title;
        }
        if let Some(file_id) = self.file_id {
            view.file_id = file_id;
        }
        if let Some(plot_settings) = self.plot_settings {
            view.plot_settings = plot_settings;
        }
    }
}

/// Check the shape of a view's plots before it is stored
pub fn validate_plot_settings(plots: &[PlotSettings]) -> Result<()> {
    for (idx, plot) in plots.iter().enumerate() {
        if plot.x_column.trim().is_empty() {
            return Err(CoreError::ValidationFailed(format!(
                "plot {idx} has no X column"
            )));
        }
        if let Some(pos) = plot.values.iter().position(|c| c.y_column.trim().is_empty()) {
            return Err(CoreError::ValidationFailed(format!(
                "course {pos} of plot {idx} has no Y column"
            )));
        }
    }
    Ok(())
}

/// Named snapshot of a zoom path, scoped to one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedZoom {
    #[serde(rename = "_id")]
    pub id: ZoomId,

    #[serde(default)]
    pub title: String,

    #[serde(rename = "zoomSequence", default)]
    pub zoom_sequence: ZoomPath,

    #[serde(rename = "viewID")]
    pub view_id: ViewId,
}

impl SavedZoom {
    /// Label shown for the zoom; untitled zooms fall back to their id
    pub fn display_name(&self) -> String {
        if self.title.trim().is_empty() {
            format!("Zoom{}", self.id)
        } else {
            self.title.clone()
        }
    }
}

/// Partial update of a saved zoom
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoomChanges {
    pub title: Option<String>,
    pub zoom_sequence: Option<ZoomPath>,
    pub view_id: Option<ViewId>,
}

impl ZoomChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.zoom_sequence.is_none() && self.view_id.is_none()
    }

    pub fn apply_to(self, zoom: &mut SavedZoom) {
        if let Some(title) = self.title {
            zoom.title = title;
        }
        if let Some(sequence) = self.zoom_sequence {
            zoom.zoom_sequence = sequence;
        }
        if let Some(view_id) = self.view_id {
            zoom.view_id = view_id;
        }
    }
}
