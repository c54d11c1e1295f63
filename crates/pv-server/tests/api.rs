use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pv_data::{CsvOptions, CsvSeriesExtractor};
use pv_server::{router, PlotService, Stores};
use pv_store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "plotviewer-test-boundary";
const WEATHER: &str = "t,v\n1,10\n2,20\n3,30\n";

fn app(csv_dir: &Path) -> Router {
    let service = PlotService::new(
        Stores::from_backend(Arc::new(MemoryStore::new())),
        CsvSeriesExtractor::new(CsvOptions::default()),
        csv_dir,
        "text/csv",
    );
    router(Arc::new(service), 1024 * 1024)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

async fn post_form(app: &Router, uri: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn upload(app: &Router, name: &str, mimetype: &str, contents: &str) -> (StatusCode, Value) {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
         Content-Type: {mimetype}\r\n\r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    );
    let request = Request::post("/files/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn upload_weather(app: &Router) -> String {
    let (status, body) = upload(app, "weather.csv", "text/csv", WEATHER).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_str().unwrap().to_string()
}

fn ys(series: &Value) -> Vec<f64> {
    series
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["y"].as_f64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_identical_upload_is_stored_once() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let first = upload_weather(&app).await;
    let second = upload_weather(&app).await;
    assert_eq!(first, second);

    let (_, files) = get(&app, "/files").await;
    assert_eq!(files.as_array().unwrap().len(), 1);
    assert_eq!(files[0]["nickname"], "weather.csv");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let (status, headers) = get(&app, &format!("/headers?id={first}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers, json!(["linear scale", "logarithmic scale", "t", "v"]));
}

#[tokio::test]
async fn test_wrong_mimetype_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, body) = upload(&app, "notes.txt", "text/plain", "hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Wrong file provided.");
    assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[tokio::test]
async fn test_values_with_transforms() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let id = upload_weather(&app).await;

    let (status, plain) = get(&app, &format!("/values?id={id}&x_value=t&y_value=v")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plain, json!([{"x": 1.0, "y": 10.0}, {"x": 2.0, "y": 20.0}, {"x": 3.0, "y": 30.0}]));

    let (_, scaled) = get(&app, &format!("/values?id={id}&x_value=t&y_value=v&func=x100")).await;
    assert_eq!(ys(&scaled), [1000.0, 2000.0, 3000.0]);

    let (_, unknown) = get(&app, &format!("/values?id={id}&x_value=t&y_value=v&func=median")).await;
    assert_eq!(unknown, plain);

    let (_, indexed) = get(&app, &format!("/values?id={id}&x_value=linear%20scale&y_value=v")).await;
    assert_eq!(indexed[2], json!({"x": 2.0, "y": 30.0}));
}

#[tokio::test]
async fn test_bad_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (status, _) = get(&app, "/values?id=not-an-id&x_value=t&y_value=v").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/headers").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = get(&app, &format!("/headers?id={missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_csv_drops_record() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let id = upload_weather(&app).await;

    for entry in std::fs::read_dir(dir.path()).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let (status, _) = get(&app, &format!("/values?id={id}&x_value=t&y_value=v")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, files) = get(&app, "/files").await;
    assert_eq!(files, json!([]));

    // Re-uploading the same bytes stores a fresh record
    let again = upload_weather(&app).await;
    assert_ne!(again, id);
}

#[tokio::test]
async fn test_functions_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (_, functions) = get(&app, "/functions").await;
    assert_eq!(functions, json!(["SMA20", "SMA50", "SMA100", "SMA500", "SMA1000", "x100"]));

    let (_, settings) = get(&app, "/settings").await;
    assert_eq!(settings["replay_step_delay_ms"], 300);
}

#[tokio::test]
async fn test_view_and_zoom_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let file_id = upload_weather(&app).await;

    let plots = json!([{
        "xColumn": "t",
        "values": [
            {"yColumn": "v", "func": "", "color": "#ff0000"},
            {"yColumn": "v", "func": "x100", "color": "#00ff00"}
        ]
    }])
    .to_string();
    let (status, view_id) = post_form(
        &app,
        "/views/add",
        &[("title", "weather"), ("fileID", &file_id), ("plotSettings", &plots)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let view_id = view_id.as_str().unwrap().to_string();

    let (_, courses) = get(&app, &format!("/valuesFromView?viewID={view_id}")).await;
    assert_eq!(courses[0].as_array().unwrap().len(), 2);
    assert_eq!(courses[0][1]["xColumn"], "t");
    assert_eq!(ys(&courses[0][1]["values"]), [1000.0, 2000.0, 3000.0]);

    let (status, edited) = post_form(&app, "/views/edit", &[("viewID", &view_id), ("title", "renamed")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited, json!(view_id));
    let (_, view) = get(&app, &format!("/views?id={view_id}")).await;
    assert_eq!(view["title"], "renamed");
    assert_eq!(view["fileID"], json!(file_id));

    let (status, zoom) = post_form(
        &app,
        "/zooms/add",
        &[("title", "spike"), ("viewID", &view_id), ("sequence", "[null,[0.1,0.9]]")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(zoom["zoomSequence"], json!([null, [0.1, 0.9]]));
    let zoom_id = zoom["_id"].as_str().unwrap().to_string();

    let (status, updated) = post_form(
        &app,
        "/zooms/update",
        &[("zoomID", &zoom_id), ("title", "closer"), ("zoomSequence", "[[0.2,0.4]]")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "closer");
    assert_eq!(updated["zoomSequence"], json!([[0.2, 0.4]]));
    assert_eq!(updated["viewID"], json!(view_id));

    let (status, _) = post_form(
        &app,
        "/zooms/add",
        &[("viewID", &view_id), ("sequence", "[[0.9,0.1]]")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, zooms) = get(&app, &format!("/zooms?viewID={view_id}")).await;
    assert_eq!(zooms.as_array().unwrap().len(), 1);

    let (status, body) = post_form(&app, "/files/delete", &[("id", &file_id)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Deleted"));

    let (status, _) = get(&app, &format!("/views?id={view_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, zooms) = get(&app, &format!("/zooms?viewID={view_id}")).await;
    assert_eq!(zooms, json!([]));
    let (_, files) = get(&app, "/files").await;
    assert_eq!(files, json!([]));
}

#[tokio::test]
async fn test_view_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let missing = uuid::Uuid::new_v4().to_string();
    let plots = json!([{"xColumn": "t", "values": [{"yColumn": "v"}]}]).to_string();

    let (status, _) = post_form(
        &app,
        "/views/add",
        &[("title", "orphan"), ("fileID", &missing), ("plotSettings", &plots)],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_form(&app, "/views/add", &[("fileID", &missing), ("plotSettings", "{")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_csv_drops_views_and_zooms() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let file_id = upload_weather(&app).await;

    let plots = json!([{"xColumn": "t", "values": [{"yColumn": "v"}]}]).to_string();
    let (_, view_id) = post_form(
        &app,
        "/views/add",
        &[("title", "weather"), ("fileID", &file_id), ("plotSettings", &plots)],
    )
    .await;
    let view_id = view_id.as_str().unwrap().to_string();
    let (status, _) = post_form(
        &app,
        "/zooms/add",
        &[("title", "spike"), ("viewID", &view_id), ("sequence", "[[0.1,0.9]]")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for entry in std::fs::read_dir(dir.path()).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let (status, _) = get(&app, &format!("/valuesFromView?viewID={view_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, &format!("/views?id={view_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, views) = get(&app, &format!("/views?fileID={file_id}")).await;
    assert_eq!(views, json!([]));
    let (_, zooms) = get(&app, &format!("/zooms?viewID={view_id}")).await;
    assert_eq!(zooms, json!([]));
}
