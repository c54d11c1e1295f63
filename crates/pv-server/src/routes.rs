//! HTTP routes
//!
//! Query parameters and form fields keep the names the browser client sends
//! (`viewID`, `fileID`, `x_value`, ...). JSON-valued form fields such as
//! `plotSettings` arrive as strings and are decoded here.

use std::sync::Arc;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use pv_core::{PlotSettings, SavedZoom, ViewChanges, ZoomChanges, ZoomPath, ZoomSettings};
use pv_data::Series;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::service::{CourseValues, PlotService, Upload};

type AppState = Arc<PlotService>;

/// Build the application router
pub fn router(service: Arc<PlotService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/values", get(values))
        .route("/headers", get(headers))
        .route("/functions", get(functions))
        .route("/valuesFromView", get(values_from_view))
        .route("/settings", get(settings))
        .route("/upload", post(upload))
        .route("/files", get(files))
        .route("/files/upload", post(upload))
        .route("/files/delete", post(delete_file))
        .route("/files/rename", post(rename_file))
        .route("/views", get(views))
        .route("/views/add", post(add_view))
        .route("/views/edit", post(edit_view))
        .route("/views/delete", post(delete_view))
        .route("/zooms", get(zooms))
        .route("/zooms/add", post(add_zoom))
        .route("/zooms/update", post(update_zoom))
        .route("/zooms/delete", post(delete_zoom))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

fn required<'a>(value: &'a Option<String>, name: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::malformed(format!("missing parameter '{name}'")))
}

fn parse_id(value: &str, name: &str) -> ApiResult<Uuid> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::malformed(format!("'{name}' is not a valid id: {value}")))
}

fn required_id(value: &Option<String>, name: &str) -> ApiResult<Uuid> {
    parse_id(required(value, name)?, name)
}

fn optional_id(value: &Option<String>, name: &str) -> ApiResult<Option<Uuid>> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => parse_id(v, name).map(Some),
        _ => Ok(None),
    }
}

fn parse_json<T: DeserializeOwned>(value: &str, name: &str) -> ApiResult<T> {
    serde_json::from_str(value).map_err(|e| ApiError::malformed(format!("'{name}' is not valid: {e}")))
}

// Series

#[derive(Debug, Deserialize)]
struct ValuesQuery {
    id: Option<String>,
    x_value: Option<String>,
    y_value: Option<String>,
    func: Option<String>,
}

async fn values(State(service): State<AppState>, Query(query): Query<ValuesQuery>) -> ApiResult<Json<Series>> {
    let id = required_id(&query.id, "id")?;
    let x = required(&query.x_value, "x_value")?;
    let y = required(&query.y_value, "y_value")?;
    let series = service.values(id, x, y, query.func.as_deref()).await?;
    Ok(Json(series))
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: Option<String>,
}

async fn headers(State(service): State<AppState>, Query(query): Query<IdQuery>) -> ApiResult<Json<Vec<String>>> {
    let id = required_id(&query.id, "id")?;
    Ok(Json(service.headers(id).await?))
}

async fn functions(State(service): State<AppState>) -> Json<Vec<&'static str>> {
    Json(service.functions())
}

#[derive(Debug, Deserialize)]
struct ViewIdQuery {
    #[serde(rename = "viewID")]
    view_id: Option<String>,
}

async fn values_from_view(
    State(service): State<AppState>,
    Query(query): Query<ViewIdQuery>,
) -> ApiResult<Json<Vec<Vec<CourseValues>>>> {
    let view_id = required_id(&query.view_id, "viewID")?;
    Ok(Json(service.values_from_view(view_id).await?))
}

async fn settings(State(service): State<AppState>) -> Json<ZoomSettings> {
    Json(service.zoom_settings().clone())
}

// Files

#[derive(Debug, Serialize)]
struct UploadResponse {
    id: Uuid,
}

/// Accept the first file field of a multipart body
async fn upload(State(service): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mimetype = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await?.to_vec();

        let id = service.upload(Upload { name, mimetype, bytes }).await?;
        return Ok(Json(UploadResponse { id }));
    }
    Err(ApiError::malformed("No files provided"))
}

async fn files(State(service): State<AppState>, Query(query): Query<IdQuery>) -> ApiResult<Json<Value>> {
    let body = match optional_id(&query.id, "id")? {
        Some(id) => serde_json::to_value(service.get_file(id).await?),
        None => serde_json::to_value(service.list_files().await?),
    };
    body.map(Json).map_err(|e| ApiError::malformed(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct FileForm {
    #[serde(alias = "fileID")]
    id: Option<String>,
    nickname: Option<String>,
}

async fn delete_file(State(service): State<AppState>, Form(form): Form<FileForm>) -> ApiResult<Json<&'static str>> {
    let id = required_id(&form.id, "id")?;
    service.delete_file(id).await?;
    Ok(Json("Deleted"))
}

async fn rename_file(State(service): State<AppState>, Form(form): Form<FileForm>) -> ApiResult<Json<&'static str>> {
    let id = required_id(&form.id, "fileID")?;
    let nickname = required(&form.nickname, "nickname")?;
    service.rename_file(id, nickname).await?;
    Ok(Json("Renamed"))
}

// Views

#[derive(Debug, Deserialize)]
struct ViewsQuery {
    id: Option<String>,
    #[serde(rename = "fileID")]
    file_id: Option<String>,
}

async fn views(State(service): State<AppState>, Query(query): Query<ViewsQuery>) -> ApiResult<Json<Value>> {
    let body = if let Some(id) = optional_id(&query.id, "id")? {
        serde_json::to_value(service.get_view(id).await?)
    } else if let Some(file_id) = optional_id(&query.file_id, "fileID")? {
        serde_json::to_value(service.views_for_file(file_id).await?)
    } else {
        serde_json::to_value(service.list_views().await?)
    };
    body.map(Json).map_err(|e| ApiError::malformed(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ViewForm {
    #[serde(rename = "viewID")]
    view_id: Option<String>,
    #[serde(rename = "fileID")]
    file_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "plotSettings")]
    plot_settings: Option<String>,
}

async fn add_view(State(service): State<AppState>, Form(form): Form<ViewForm>) -> ApiResult<Json<Uuid>> {
    let file_id = required_id(&form.file_id, "fileID")?;
    let plot_settings: Vec<PlotSettings> = parse_json(required(&form.plot_settings, "plotSettings")?, "plotSettings")?;
    let title = form.title.unwrap_or_default();
    Ok(Json(service.add_view(&title, file_id, plot_settings).await?))
}

async fn edit_view(State(service): State<AppState>, Form(form): Form<ViewForm>) -> ApiResult<Json<Uuid>> {
    let view_id = required_id(&form.view_id, "viewID")?;
    let changes = ViewChanges {
        title: form.title,
        file_id: optional_id(&form.file_id, "fileID")?,
        plot_settings: form
            .plot_settings
            .as_deref()
            .map(|raw| parse_json(raw, "plotSettings"))
            .transpose()?,
    };
    Ok(Json(service.edit_view(view_id, changes).await?))
}

async fn delete_view(State(service): State<AppState>, Form(form): Form<IdQuery>) -> ApiResult<Json<&'static str>> {
    let id = required_id(&form.id, "id")?;
    service.delete_view(id).await?;
    Ok(Json("Deleted"))
}

// Zooms

async fn zooms(State(service): State<AppState>, Query(query): Query<ViewIdQuery>) -> ApiResult<Json<Vec<SavedZoom>>> {
    let view_id = required_id(&query.view_id, "viewID")?;
    Ok(Json(service.zooms_for_view(view_id).await?))
}

#[derive(Debug, Deserialize)]
struct ZoomForm {
    #[serde(rename = "zoomID")]
    zoom_id: Option<String>,
    #[serde(rename = "viewID")]
    view_id: Option<String>,
    title: Option<String>,
    sequence: Option<String>,
    #[serde(rename = "zoomSequence")]
    zoom_sequence: Option<String>,
}

async fn add_zoom(State(service): State<AppState>, Form(form): Form<ZoomForm>) -> ApiResult<Json<SavedZoom>> {
    let view_id = required_id(&form.view_id, "viewID")?;
    let raw = form
        .sequence
        .as_deref()
        .or(form.zoom_sequence.as_deref())
        .ok_or_else(|| ApiError::malformed("missing parameter 'sequence'"))?;
    let sequence: ZoomPath = parse_json(raw, "sequence")?;
    let title = form.title.unwrap_or_default();
    Ok(Json(service.add_zoom(&title, sequence, view_id).await?))
}

async fn update_zoom(State(service): State<AppState>, Form(form): Form<ZoomForm>) -> ApiResult<Json<SavedZoom>> {
    let zoom_id = required_id(&form.zoom_id, "zoomID")?;
    let changes = ZoomChanges {
        title: form.title,
        zoom_sequence: form
            .zoom_sequence
            .as_deref()
            .map(|raw| parse_json(raw, "zoomSequence"))
            .transpose()?,
        view_id: optional_id(&form.view_id, "viewID")?,
    };
    Ok(Json(service.update_zoom(zoom_id, changes).await?))
}

async fn delete_zoom(State(service): State<AppState>, Form(form): Form<IdQuery>) -> ApiResult<Json<&'static str>> {
    let id = required_id(&form.id, "id")?;
    service.delete_zoom(id).await?;
    Ok(Json("Deleted."))
}
