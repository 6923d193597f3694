mod common;

use common::{start_mock_server, test_app, test_app_with};
use compressio_client::cli::{self, AlreadyReported};
use compressio_client::config::CompressioConfig;
use compressio_client::controller::Controller;
use compressio_client::error::CompressioError;
use compressio_client::notify::NotificationLevel;
use compressio_client::orchestrator::CompressOutcome;
use compressio_client::storage::COMPRESSION_COUNT_KEY;
use serde_json::json;
use std::fs;

#[tokio::test]
async fn test_select_filters_invalid_files() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());

    let png = app.file("photo.png", b"png");
    let exe = app.file("setup.exe", b"MZ");
    assert_eq!(controller.select(&[png, exe]).unwrap(), 1);

    let selection = controller.selection();
    assert_eq!(selection.len(), 1);
    assert_eq!(selection[0].name, "photo.png");
    assert_eq!(app.notifier.messages(NotificationLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_select_replaces_and_drop_extends() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());

    controller.select(&[app.file("a.png", b"a")]).unwrap();
    controller.select(&[app.file("b.txt", b"b")]).unwrap();
    assert_eq!(controller.selection().len(), 1);
    assert_eq!(controller.selection()[0].name, "b.txt");

    controller.drop_files(&[app.file("c.pdf", b"c")]).unwrap();
    assert_eq!(controller.selection().len(), 2);

    controller.clear_selection().unwrap();
    assert!(!controller.can_submit());
}

#[tokio::test]
async fn test_submit_without_selection_is_refused() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());

    assert!(!controller.can_submit());
    let err = controller.submit().await.unwrap_err();
    assert!(matches!(err, CompressioError::Validation(_)));
    assert!(server.state.requests().is_empty());
    assert_eq!(app.notifier.messages(NotificationLevel::Warning).len(), 1);
}

#[tokio::test]
async fn test_submit_runs_each_file_independently() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());

    controller
        .select(&[app.file("a.png", b"a"), app.file("b.txt", b"b")])
        .unwrap();
    assert!(controller.can_submit());

    let outcomes = controller.submit().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert!(!controller.is_busy());
    assert!(controller.selection().is_empty());

    let mut ids: Vec<String> = app
        .ctx
        .history
        .all()
        .into_iter()
        .map(|e| e.file_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["f1", "f2"]);
    assert!(controller.history_table().contains("photo.png"));
}

#[tokio::test]
async fn test_delete_and_clear_history() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());

    controller
        .select(&[app.file("a.png", b"a"), app.file("b.png", b"b")])
        .unwrap();
    controller.submit().await.unwrap();

    let entries = app.ctx.history.all();
    assert_eq!(entries.len(), 2);
    assert_eq!(controller.delete(&entries[0].timestamp).unwrap(), 1);
    assert_eq!(controller.delete("2000-01-01T00:00:00.000Z").unwrap(), 0);
    assert_eq!(app.ctx.history.all(), vec![entries[1].clone()]);

    controller.clear_history().unwrap();
    assert!(app.ctx.history.all().is_empty());
}

#[tokio::test]
async fn test_download_compressed_and_original() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());

    let compressed = controller.download("f1", false).await.unwrap();
    let original = controller.download("f1", true).await.unwrap();

    assert_eq!(
        compressed,
        app.download_dir().join("compressed_f1_photo.webp")
    );
    assert_eq!(original, app.download_dir().join("photo.png"));
    assert_eq!(fs::read(&compressed).unwrap(), b"small");
    assert_eq!(fs::read(&original).unwrap(), b"original");

    let requests = server.state.requests();
    assert!(requests.contains(&"GET /download/f1?original=false".to_string()));
    assert!(requests.contains(&"GET /download/f1?original=true".to_string()));
    assert_eq!(app.notifier.messages(NotificationLevel::Success).len(), 2);
}

#[tokio::test]
async fn test_download_without_header_uses_fallback_name() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());

    let first = controller.download("nameless", false).await.unwrap();
    let second = controller.download("nameless", false).await.unwrap();
    let original = controller.download("nameless", true).await.unwrap();

    assert_eq!(first, app.download_dir().join("downloaded_nameless"));
    assert_eq!(second, app.download_dir().join("downloaded_nameless (1)"));
    assert_eq!(original, app.download_dir().join("original_nameless"));
}

#[tokio::test]
async fn test_download_failure_leaves_history_alone() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());
    controller.select(&[app.file("a.png", b"a")]).unwrap();
    controller.submit().await.unwrap();
    let before = app.ctx.history.all();

    let err = controller.download("missing", false).await.unwrap_err();

    assert!(matches!(err, CompressioError::Api { status: 404, .. }));
    assert_eq!(app.ctx.history.all(), before);
    assert_eq!(
        app.notifier.messages(NotificationLevel::Error),
        vec!["File not found".to_string()]
    );
    assert!(!app.download_dir().join("downloaded_missing").exists());
}

#[tokio::test]
async fn test_second_submit_while_busy_is_refused() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());
    controller.select(&[app.file("a.png", b"a")]).unwrap();

    let second = async {
        while !controller.is_busy() {
            tokio::task::yield_now().await;
        }
        controller.submit().await
    };
    let (first, second) = tokio::join!(controller.submit(), second);

    let busy = app.ctx.language.messages().busy;
    assert!(matches!(second, Err(CompressioError::Other(ref m)) if m == busy));
    assert_eq!(
        app.notifier.messages(NotificationLevel::Warning),
        vec![busy.to_string()]
    );

    let first = first.unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].is_success());
    let uploads = server
        .state
        .requests()
        .iter()
        .filter(|r| r.as_str() == "POST /upload")
        .count();
    assert_eq!(uploads, 1);
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn test_anonymous_limit_holds_for_files_submitted_together() {
    let server = start_mock_server().await;
    let config = CompressioConfig {
        anonymous_limit: Some(1),
        ..Default::default()
    };
    let app = test_app_with(&server, config);
    let controller = Controller::new(app.ctx.clone());
    controller
        .select(&[
            app.file("a.png", b"a"),
            app.file("b.png", b"b"),
            app.file("c.png", b"c"),
        ])
        .unwrap();

    let outcomes = controller.submit().await.unwrap();

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    let refused = outcomes
        .iter()
        .filter(|o| **o == CompressOutcome::QuotaExceeded)
        .count();
    assert_eq!((successes, refused), (1, 2));
    assert_eq!(app.ctx.history.all().len(), 1);
    assert_eq!(
        app.ctx.store.get_item(COMPRESSION_COUNT_KEY).as_deref(),
        Some("1")
    );
}

#[tokio::test]
async fn test_failed_compression_does_not_use_up_the_limit() {
    let server = start_mock_server().await;
    *server.state.upload_error.lock().unwrap() = Some((500, json!({"detail": "disk full"})));
    let config = CompressioConfig {
        anonymous_limit: Some(1),
        ..Default::default()
    };
    let app = test_app_with(&server, config);
    let controller = Controller::new(app.ctx.clone());
    controller.select(&[app.file("a.png", b"a")]).unwrap();
    controller.submit().await.unwrap();
    assert_eq!(
        app.ctx.store.get_item(COMPRESSION_COUNT_KEY).as_deref(),
        Some("0")
    );

    *server.state.upload_error.lock().unwrap() = None;
    controller.select(&[app.file("a.png", b"a")]).unwrap();
    let outcomes = controller.submit().await.unwrap();
    assert!(outcomes[0].is_success());
}

#[tokio::test]
async fn test_download_of_recorded_entry_follows_result_link() {
    let server = start_mock_server().await;
    let app = test_app(&server);
    let controller = Controller::new(app.ctx.clone());
    controller.select(&[app.file("a.png", b"a")]).unwrap();
    controller.submit().await.unwrap();
    assert_eq!(
        app.ctx.history.all()[0].download_url.as_deref(),
        Some("/files/f1")
    );

    let compressed = controller.download("f1", false).await.unwrap();
    let original = controller.download("f1", true).await.unwrap();

    assert_eq!(compressed, app.download_dir().join("linked_f1.webp"));
    assert_eq!(fs::read(&compressed).unwrap(), b"linked");
    assert_eq!(original, app.download_dir().join("photo.png"));

    let requests = server.state.requests();
    assert!(requests.contains(&"GET /files/f1".to_string()));
    assert!(requests.contains(&"GET /download/f1?original=true".to_string()));
    assert!(!requests.contains(&"GET /download/f1?original=false".to_string()));
}

#[tokio::test]
async fn test_failed_download_is_reported_once() {
    let server = start_mock_server().await;
    let app = test_app(&server);

    let err = cli::download(app.ctx.clone(), "missing", false)
        .await
        .unwrap_err();

    assert!(err.is::<AlreadyReported>());
    assert!(!cli::report_error(&err));
    assert_eq!(
        app.notifier.messages(NotificationLevel::Error),
        vec!["File not found".to_string()]
    );
}
