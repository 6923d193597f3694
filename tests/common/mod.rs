//! In-process stand-in for the compression API.

#![allow(dead_code)]

use compressio_client::api::HttpCompressionApi;
use compressio_client::config::CompressioConfig;
use compressio_client::context::AppContext;
use compressio_client::notify::RecordingNotifier;
use compressio_client::storage::LocalStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use warp::http::{Response, StatusCode};
use warp::hyper::body::Bytes;
use warp::Filter;

pub const TEST_API_KEY: &str = "test-key";

#[derive(Default)]
pub struct MockState {
    /// Every request the server saw, as `METHOD path[?query]`
    pub requests: Mutex<Vec<String>>,
    /// When set, `/upload` answers with this status and body
    pub upload_error: Mutex<Option<(u16, Value)>>,
    /// When set, a successful `/upload` answers with this body instead
    pub upload_body: Mutex<Option<Value>>,
    /// When set, `/compress` answers with this status and body
    pub compress_error: Mutex<Option<(u16, Value)>>,
    uploads: AtomicUsize,
}

impl MockState {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, line: String) {
        self.requests.lock().unwrap().push(line);
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

fn api_key() -> impl Filter<Extract = (), Error = warp::Rejection> + Copy {
    warp::header::exact("x-api-key", TEST_API_KEY)
}

fn reply(status: u16, body: Value) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&body),
        StatusCode::from_u16(status).unwrap(),
    )
}

/// Result record for a file id, the way the service reports a webp conversion
pub fn result_record(id: &str) -> Value {
    json!({
        "id": id,
        "original_filename": "photo.png",
        "compressed_filename": format!("compressed_{}_photo.webp", id),
        "size_before": 1000,
        "size_after": 400,
        "ratio": 60.0,
        "compression_method": "webp",
        "download_url": format!("/files/{}", id),
    })
}

pub async fn start_mock_server() -> MockServer {
    let state = Arc::new(MockState::default());
    let with_state = {
        let state = state.clone();
        warp::any().map(move || state.clone())
    };

    let upload = warp::path("upload")
        .and(warp::path::end())
        .and(warp::post())
        .and(api_key())
        .and(warp::body::bytes())
        .and(with_state.clone())
        .map(|body: Bytes, state: Arc<MockState>| {
            state.record("POST /upload".to_string());
            if let Some((status, body)) = state.upload_error.lock().unwrap().clone() {
                return reply(status, body);
            }
            let text = String::from_utf8_lossy(&body);
            if !text.contains("name=\"file\"") {
                return reply(422, json!({"detail": "file part missing"}));
            }
            if let Some(body) = state.upload_body.lock().unwrap().clone() {
                return reply(200, body);
            }
            let n = state.uploads.fetch_add(1, Ordering::SeqCst) + 1;
            reply(
                200,
                json!({"id": format!("f{}", n), "filename": "photo.png", "size": body.len()}),
            )
        });

    let compress = warp::path("compress")
        .and(warp::path::end())
        .and(warp::post())
        .and(api_key())
        .and(warp::body::form::<HashMap<String, String>>())
        .and(with_state.clone())
        .map(|form: HashMap<String, String>, state: Arc<MockState>| {
            let id = form.get("file_id").cloned().unwrap_or_default();
            let method = form.get("method").cloned().unwrap_or_default();
            state.record(format!("POST /compress file_id={} method={}", id, method));
            if let Some((status, body)) = state.compress_error.lock().unwrap().clone() {
                return reply(status, body);
            }
            reply(
                200,
                json!({"id": id, "size_before": 1000, "size_after": 400, "method": "webp"}),
            )
        });

    let result = warp::path!("result" / String)
        .and(warp::get())
        .and(api_key())
        .and(with_state.clone())
        .map(|id: String, state: Arc<MockState>| {
            state.record(format!("GET /result/{}", id));
            if id == "missing" {
                return reply(404, json!({"detail": "Result not found"}));
            }
            reply(200, result_record(&id))
        });

    let download = warp::path!("download" / String)
        .and(warp::get())
        .and(api_key())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state.clone())
        .map(
            |id: String, query: HashMap<String, String>, state: Arc<MockState>| {
                let original = query.get("original").map(String::as_str) == Some("true");
                state.record(format!("GET /download/{}?original={}", id, original));

                if id == "missing" {
                    return Response::builder()
                        .status(StatusCode::NOT_FOUND)
                        .header("content-type", "application/json")
                        .body(br#"{"detail":"File not found"}"#.to_vec())
                        .unwrap();
                }

                let mut builder = Response::builder().status(StatusCode::OK);
                if id != "nameless" {
                    let filename = if original {
                        "photo.png".to_string()
                    } else {
                        format!("compressed_{}_photo.webp", id)
                    };
                    builder = builder.header(
                        "content-disposition",
                        format!("attachment; filename=\"{}\"", filename),
                    );
                }
                let body = if original { b"original".to_vec() } else { b"small".to_vec() };
                builder.body(body).unwrap()
            },
        );

    let files = warp::path!("files" / String)
        .and(warp::get())
        .and(api_key())
        .and(with_state.clone())
        .map(|id: String, state: Arc<MockState>| {
            state.record(format!("GET /files/{}", id));
            Response::builder()
                .status(StatusCode::OK)
                .header(
                    "content-disposition",
                    format!("attachment; filename=\"linked_{}.webp\"", id),
                )
                .body(b"linked".to_vec())
                .unwrap()
        });

    let compare = warp::path!("compare" / String)
        .and(warp::get())
        .and(api_key())
        .and(with_state.clone())
        .map(|id: String, state: Arc<MockState>| {
            state.record(format!("GET /compare/{}", id));
            if id == "missing" {
                return reply(404, json!({"detail": "File not found."}));
            }
            let mut record = result_record(&id);
            record["decompression_time_ms"] = json!(9.5);
            record["diff_summary"] = json!("Image similarity (SSIM): 0.97, PSNR: 38.20 dB");
            record["preview_before"] = Value::Null;
            record["sensitive_entities_detected"] = json!(false);
            reply(200, record)
        });

    // Public on the real service, so no key check
    let info = warp::path!("info")
        .and(warp::get())
        .and(with_state.clone())
        .map(|state: Arc<MockState>| {
            state.record("GET /info".to_string());
            reply(
                200,
                json!({
                    "app_name": "Compressio API",
                    "version": "1.2.0",
                    "description": "Smart file compression",
                    "max_upload_size_mb": 100,
                    "cleanup_interval_hours": 1,
                    "file_lifespan_hours": 24,
                    "upload_dir": "uploads",
                    "download_dir": "downloads",
                }),
            )
        });

    let health = warp::path!("health")
        .and(warp::get())
        .and(api_key())
        .map(|| reply(200, json!({"status": "ok", "message": "API is healthy"})));

    let methods = warp::path!("compression_methods")
        .and(warp::get())
        .and(api_key())
        .map(|| {
            reply(
                200,
                json!({"methods": [
                    {"name": "AI (automatic)", "value": "ai", "description": "Let the service choose"},
                    {"name": "WebP", "value": "webp"},
                ]}),
            )
        });

    let routes = upload
        .or(compress)
        .or(result)
        .or(download)
        .or(files)
        .or(compare)
        .or(info)
        .or(health)
        .or(methods);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    MockServer {
        base_url: format!("http://{}", addr),
        state,
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub ctx: Arc<AppContext<HttpCompressionApi>>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn download_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Write a file with the given name into the scratch directory
    pub fn file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

pub fn test_app(server: &MockServer) -> TestApp {
    test_app_with(server, CompressioConfig::default())
}

pub fn test_app_with(server: &MockServer, config: CompressioConfig) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = config.with_overrides(
        Some(TEST_API_KEY.to_string()),
        Some(server.base_url.clone()),
        Some(dir.path().join("downloads").to_string_lossy().into_owned()),
    );
    let store = Arc::new(LocalStore::open(store_path(dir.path())).unwrap());
    let api = Arc::new(HttpCompressionApi::new(config.server_url(), config.api_key()).unwrap());
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = Arc::new(AppContext::new(config, store, api, notifier.clone()));
    TestApp { dir, ctx, notifier }
}

fn store_path(dir: &Path) -> PathBuf {
    dir.join("local_storage.json")
}
