use mockito::Server;
use ota_updater::config::{FileStateStore, StateStore, UpdaterConfig, STATE_FILE_NAME};
use ota_updater::core::{
    CheckFinished, HttpUpdateSource, RecordingNotifier, StaticConnectivity, UpdateCheckService,
};
use ota_updater::BuildDate;
use std::sync::Arc;
use tempfile::TempDir;

const UPDATE: &str = r#"{
    "filename": "aex-beryllium-20240101.zip",
    "filesize": 1048576,
    "build_date": "2024-01-01",
    "md5": "d41d8cd98f00b204e9800998ecf8427e",
    "url": "https://downloads.example.org/aex-beryllium-20240101.zip",
    "changelog": "Security patch",
    "addons": []
}"#;

struct Flow {
    service: UpdateCheckService,
    notifier: Arc<RecordingNotifier>,
    store: Arc<FileStateStore>,
    _dir: TempDir,
}

fn flow(server: &Server, installed: &str) -> Flow {
    let dir = TempDir::new().unwrap();
    let config = UpdaterConfig::default()
        .with_base_url(format!("{}/ota", server.url()))
        .with_timeout_ms(2000)
        .with_max_retries(0);
    let source = HttpUpdateSource::from_config(&config, "beryllium", installed);
    let store = Arc::new(FileStateStore::in_dir(dir.path()));
    let notifier = Arc::new(RecordingNotifier::new());
    let service = UpdateCheckService::builder(
        "beryllium",
        BuildDate::parse(installed),
        Arc::new(source),
        store.clone(),
    )
    .notifier(notifier.clone())
    .connectivity(Arc::new(StaticConnectivity(true)))
    .build();
    Flow {
        service,
        notifier,
        store,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_newer_build_over_http() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/ota/beryllium")
        .with_status(200)
        .with_body(UPDATE)
        .create_async()
        .await;

    let flow = flow(&server, "2023-01-01");
    let event = flow.service.check().unwrap().wait().await.unwrap();
    m.assert_async().await;
    assert_eq!(
        event,
        CheckFinished {
            update_count: 1,
            real_update_count: 1,
            new_update_count: 1,
        }
    );

    let delivered = flow.notifier.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].inbox_lines, vec!["aex-beryllium-20240101.zip"]);

    assert!(flow.store.path().ends_with(STATE_FILE_NAME));
    let state = flow.store.load().await.unwrap();
    assert!(state.boot_check_completed);
    assert_eq!(state.updates.len(), 1);
    assert_eq!(state.updates[0].changelog(), "Security patch");
    assert_eq!(state.updates[0].addons(), "[]");
}

#[tokio::test]
async fn test_same_build_over_http() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/ota/beryllium")
        .with_status(200)
        .with_body(UPDATE)
        .create_async()
        .await;

    let flow = flow(&server, "2024-01-01");
    let event = flow.service.check().unwrap().wait().await.unwrap();
    assert_eq!(event.update_count, 1);
    assert_eq!(event.real_update_count, 0);
    assert_eq!(event.new_update_count, 0);
    assert!(flow.notifier.delivered().await.is_empty());

    let updates = flow.service.available_updates().await.unwrap();
    assert_eq!(updates.len(), 1);
    assert!(!updates[0].is_newer_than_installed());
}

#[tokio::test]
async fn test_incomplete_update_over_http() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/ota/beryllium")
        .with_status(200)
        .with_body(r#"{"filename":"update.zip","filesize":123,"build_date":"2024-01-01","url":"http://x/u.zip"}"#)
        .create_async()
        .await;

    let flow = flow(&server, "2023-01-01");
    let event = flow.service.check().unwrap().wait().await.unwrap();
    assert_eq!(event, CheckFinished::empty());

    let state = flow.store.load().await.unwrap();
    assert!(state.boot_check_completed);
    assert!(state.last_update_check.is_some());
    assert!(state.updates.is_empty());
}

#[tokio::test]
async fn test_server_error_leaves_state_untouched() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/ota/beryllium")
        .with_status(500)
        .create_async()
        .await;

    let flow = flow(&server, "2023-01-01");
    let event = flow.service.check().unwrap().wait().await.unwrap();
    assert_eq!(event, CheckFinished::empty());
    assert!(!flow.store.path().exists());
    assert!(!flow.store.load().await.unwrap().boot_check_completed);
}
