//! SQLite store implementation
//!
//! Nested plot settings and zoom sequences are kept as JSON text columns.

use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pv_core::model::validate_plot_settings;
use pv_core::{
    CoreError, FileId, FileRecord, FileStore, NewFile, PlotSettings, Result, SavedZoom, View,
    ViewChanges, ViewId, ViewStore, ZoomChanges, ZoomId, ZoomPath, ZoomStore,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::storage_error;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS files (
        id            TEXT PRIMARY KEY,
        nickname      TEXT NOT NULL,
        filename      TEXT NOT NULL,
        mimetype      TEXT NOT NULL,
        md5           TEXT NOT NULL,
        size          INTEGER NOT NULL,
        created_at    TEXT NOT NULL,
        last_accessed TEXT
    );
    CREATE INDEX IF NOT EXISTS files_md5_mimetype ON files (md5, mimetype);

    CREATE TABLE IF NOT EXISTS views (
        id            TEXT PRIMARY KEY,
        title         TEXT NOT NULL,
        file_id       TEXT NOT NULL,
        plot_settings TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS views_file_id ON views (file_id);

    CREATE TABLE IF NOT EXISTS zooms (
        id            TEXT PRIMARY KEY,
        title         TEXT NOT NULL,
        zoom_sequence TEXT NOT NULL,
        view_id       TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS zooms_view_id ON zooms (view_id);
";

const FILE_COLUMNS: &str = "id, nickname, filename, mimetype, md5, size, created_at, last_accessed";

/// Raw file row as stored
type FileRow = (String, String, String, String, String, i64, String, Option<String>);

/// Raw view row as stored
type ViewRow = (String, String, String, String);

/// Raw zoom row as stored
type ZoomRow = (String, String, String, String);

/// Store backed by a single SQLite connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| storage_error("Failed to open SQLite database", e))?;
        info!(path = %path.display(), "Opened SQLite store");
        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| storage_error("Failed to open SQLite database", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| storage_error("Failed to create schema", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking database work off the async runtime
    async fn call<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            work(&conn)
        })
        .await
        .map_err(|e| storage_error("Database task failed", e))?
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| storage_error("Invalid stored id", e))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| storage_error("Invalid stored timestamp", e))
}

fn file_from_row(row: FileRow) -> Result<FileRecord> {
    let (id, nickname, filename, mimetype, md5, size, created_at, last_accessed) = row;
    Ok(FileRecord {
        id: parse_id(&id)?,
        nickname,
        filename,
        mimetype,
        md5,
        size: u64::try_from(size).unwrap_or_default(),
        created_at: parse_time(&created_at)?,
        last_accessed: last_accessed.as_deref().map(parse_time).transpose()?,
    })
}

fn view_from_row(row: ViewRow) -> Result<View> {
    let (id, title, file_id, plot_settings) = row;
    Ok(View {
        id: parse_id(&id)?,
        title,
        file_id: parse_id(&file_id)?,
        plot_settings: serde_json::from_str(&plot_settings)
            .map_err(|e| storage_error("Invalid stored plot settings", e))?,
    })
}

fn zoom_from_row(row: ZoomRow) -> Result<SavedZoom> {
    let (id, title, zoom_sequence, view_id) = row;
    Ok(SavedZoom {
        id: parse_id(&id)?,
        title,
        zoom_sequence: serde_json::from_str(&zoom_sequence)
            .map_err(|e| storage_error("Invalid stored zoom sequence", e))?,
        view_id: parse_id(&view_id)?,
    })
}

fn query_files(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(sql).map_err(|e| storage_error("Failed to prepare query", e))?;
    let rows = stmt
        .query_map(args, |row| -> rusqlite::Result<FileRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })
        .map_err(|e| storage_error("Failed to query files", e))?;

    let records = rows
        .map(|row| file_from_row(row.map_err(|e| storage_error("Failed to read file row", e))?))
        .collect();
    records
}

fn query_views(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<View>> {
    let mut stmt = conn.prepare(sql).map_err(|e| storage_error("Failed to prepare query", e))?;
    let rows = stmt
        .query_map(args, |row| -> rusqlite::Result<ViewRow> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .map_err(|e| storage_error("Failed to query views", e))?;

    let records = rows
        .map(|row| view_from_row(row.map_err(|e| storage_error("Failed to read view row", e))?))
        .collect();
    records
}

fn query_zooms(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<SavedZoom>> {
    let mut stmt = conn.prepare(sql).map_err(|e| storage_error("Failed to prepare query", e))?;
    let rows = stmt
        .query_map(args, |row| -> rusqlite::Result<ZoomRow> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .map_err(|e| storage_error("Failed to query zooms", e))?;

    let records = rows
        .map(|row| zoom_from_row(row.map_err(|e| storage_error("Failed to read zoom row", e))?))
        .collect();
    records
}

fn exists(conn: &Connection, table: &str, id: Uuid) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(|e| storage_error("Failed to look up record", e))
}

/// Map "no row changed" to `NotFound`
fn expect_one(changed: usize, kind: &'static str, id: Uuid) -> Result<()> {
    if changed == 0 {
        Err(CoreError::not_found(kind, id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl FileStore for SqliteStore {
    async fn save(&self, file: NewFile) -> Result<FileId> {
        let id = Uuid::new_v4();
        let created_at = Utc::now().to_rfc3339();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO files (id, nickname, filename, mimetype, md5, size, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    file.nickname,
                    file.filename,
                    file.mimetype,
                    file.md5,
                    i64::try_from(file.size).unwrap_or(i64::MAX),
                    created_at
                ],
            )
            .map_err(|e| storage_error("Failed to insert file", e))?;
            Ok(id)
        })
        .await
    }

    async fn find_by_md5_and_mimetype(&self, md5: &str, mimetype: &str) -> Result<Vec<FileRecord>> {
        let (md5, mimetype) = (md5.to_string(), mimetype.to_string());
        self.call(move |conn| {
            let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE md5 = ?1 AND mimetype = ?2 ORDER BY rowid");
            query_files(conn, &sql, params![md5, mimetype])
        })
        .await
    }

    async fn get(&self, id: FileId) -> Result<FileRecord> {
        self.call(move |conn| {
            let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1");
            query_files(conn, &sql, params![id.to_string()])?
                .pop()
                .ok_or_else(|| CoreError::not_found("file", id))
        })
        .await
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        self.call(|conn| {
            let sql = format!("SELECT {FILE_COLUMNS} FROM files ORDER BY rowid");
            query_files(conn, &sql, params![])
        })
        .await
    }

    async fn delete(&self, id: FileId) -> Result<()> {
        self.call(move |conn| {
            let changed = conn
                .execute("DELETE FROM files WHERE id = ?1", params![id.to_string()])
                .map_err(|e| storage_error("Failed to delete file", e))?;
            expect_one(changed, "file", id)
        })
        .await
    }

    async fn rename(&self, id: FileId, nickname: &str) -> Result<()> {
        let nickname = nickname.to_string();
        self.call(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE files SET nickname = ?1 WHERE id = ?2",
                    params![nickname, id.to_string()],
                )
                .map_err(|e| storage_error("Failed to rename file", e))?;
            expect_one(changed, "file", id)
        })
        .await
    }

    async fn touch(&self, id: FileId, at: DateTime<Utc>) -> Result<()> {
        self.call(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE files SET last_accessed = ?1 WHERE id = ?2",
                    params![at.to_rfc3339(), id.to_string()],
                )
                .map_err(|e| storage_error("Failed to update file", e))?;
            expect_one(changed, "file", id)
        })
        .await
    }
}

#[async_trait]
impl ViewStore for SqliteStore {
    async fn create(&self, title: &str, file_id: FileId, plot_settings: Vec<PlotSettings>) -> Result<ViewId> {
        validate_plot_settings(&plot_settings)?;
        let settings = serde_json::to_string(&plot_settings)
            .map_err(|e| CoreError::MalformedInput(e.to_string()))?;
        let title = title.to_string();
        let id = Uuid::new_v4();

        self.call(move |conn| {
            conn.execute(
                "INSERT INTO views (id, title, file_id, plot_settings) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), title, file_id.to_string(), settings],
            )
            .map_err(|e| storage_error("Failed to insert view", e))?;
            Ok(id)
        })
        .await
    }

    async fn get(&self, id: ViewId) -> Result<View> {
        self.call(move |conn| {
            query_views(
                conn,
                "SELECT id, title, file_id, plot_settings FROM views WHERE id = ?1",
                params![id.to_string()],
            )?
            .pop()
            .ok_or_else(|| CoreError::not_found("view", id))
        })
        .await
    }

    async fn list(&self) -> Result<Vec<View>> {
        self.call(|conn| {
            query_views(conn, "SELECT id, title, file_id, plot_settings FROM views ORDER BY rowid", params![])
        })
        .await
    }

    async fn list_by_file(&self, file_id: FileId) -> Result<Vec<View>> {
        self.call(move |conn| {
            query_views(
                conn,
                "SELECT id, title, file_id, plot_settings FROM views WHERE file_id = ?1 ORDER BY rowid",
                params![file_id.to_string()],
            )
        })
        .await
    }

    async fn update(&self, id: ViewId, changes: ViewChanges) -> Result<()> {
        changes.validate()?;
        self.call(move |conn| {
            let mut view = query_views(
                conn,
                "SELECT id, title, file_id, plot_settings FROM views WHERE id = ?1",
                params![id.to_string()],
            )?
            .pop()
            .ok_or_else(|| CoreError::not_found("view", id))?;

            changes.apply_to(&mut view);
            let settings = serde_json::to_string(&view.plot_settings)
                .map_err(|e| CoreError::MalformedInput(e.to_string()))?;
            conn.execute(
                "UPDATE views SET title = ?1, file_id = ?2, plot_settings = ?3 WHERE id = ?4",
                params![view.title, view.file_id.to_string(), settings, id.to_string()],
            )
            .map_err(|e| storage_error("Failed to update view", e))?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: ViewId) -> Result<()> {
        self.call(move |conn| {
            let changed = conn
                .execute("DELETE FROM views WHERE id = ?1", params![id.to_string()])
                .map_err(|e| storage_error("Failed to delete view", e))?;
            expect_one(changed, "view", id)
        })
        .await
    }
}

#[async_trait]
impl ZoomStore for SqliteStore {
    async fn create(&self, title: &str, sequence: ZoomPath, view_id: ViewId) -> Result<SavedZoom> {
        let encoded = serde_json::to_string(&sequence)
            .map_err(|e| CoreError::MalformedInput(e.to_string()))?;
        let zoom = SavedZoom {
            id: Uuid::new_v4(),
            title: title.to_string(),
            zoom_sequence: sequence,
            view_id,
        };

        self.call(move |conn| {
            if !exists(conn, "views", view_id)? {
                return Err(CoreError::not_found("view", view_id));
            }
            conn.execute(
                "INSERT INTO zooms (id, title, zoom_sequence, view_id) VALUES (?1, ?2, ?3, ?4)",
                params![zoom.id.to_string(), zoom.title, encoded, view_id.to_string()],
            )
            .map_err(|e| storage_error("Failed to insert zoom", e))?;
            Ok(zoom)
        })
        .await
    }

    async fn get(&self, id: ZoomId) -> Result<SavedZoom> {
        self.call(move |conn| {
            query_zooms(
                conn,
                "SELECT id, title, zoom_sequence, view_id FROM zooms WHERE id = ?1",
                params![id.to_string()],
            )?
            .pop()
            .ok_or_else(|| CoreError::not_found("zoom", id))
        })
        .await
    }

    async fn list_by_view(&self, view_id: ViewId) -> Result<Vec<SavedZoom>> {
        self.call(move |conn| {
            query_zooms(
                conn,
                "SELECT id, title, zoom_sequence, view_id FROM zooms WHERE view_id = ?1 ORDER BY rowid",
                params![view_id.to_string()],
            )
        })
        .await
    }

    async fn update(&self, id: ZoomId, changes: ZoomChanges) -> Result<SavedZoom> {
        self.call(move |conn| {
            if let Some(view_id) = changes.view_id {
                if !exists(conn, "views", view_id)? {
                    return Err(CoreError::not_found("view", view_id));
                }
            }
            let mut zoom = query_zooms(
                conn,
                "SELECT id, title, zoom_sequence, view_id FROM zooms WHERE id = ?1",
                params![id.to_string()],
            )?
            .pop()
            .ok_or_else(|| CoreError::not_found("zoom", id))?;

            changes.apply_to(&mut zoom);
            let encoded = serde_json::to_string(&zoom.zoom_sequence)
                .map_err(|e| CoreError::MalformedInput(e.to_string()))?;
            conn.execute(
                "UPDATE zooms SET title = ?1, zoom_sequence = ?2, view_id = ?3 WHERE id = ?4",
                params![zoom.title, encoded, zoom.view_id.to_string(), id.to_string()],
            )
            .map_err(|e| storage_error("Failed to update zoom", e))?;
            Ok(zoom)
        })
        .await
    }

    async fn delete(&self, id: ZoomId) -> Result<()> {
        self.call(move |conn| {
            let changed = conn
                .execute("DELETE FROM zooms WHERE id = ?1", params![id.to_string()])
                .map_err(|e| storage_error("Failed to delete zoom", e))?;
            expect_one(changed, "zoom", id)
        })
        .await
    }
}
