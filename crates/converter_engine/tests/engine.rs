use std::fs;
use std::time::Duration;

use converter_engine::{
    ClientSettings, EngineConfig, EngineEvent, EngineHandle, RemoteStatus, SyncStrategy,
    UploadFile,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn next_event(engine: &mut EngineHandle) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), engine.recv())
        .await
        .expect("event in time")
        .expect("engine open")
}

/// Skips progress reports, which arrive in varying numbers.
async fn next_outcome(engine: &mut EngineHandle) -> EngineEvent {
    loop {
        let event = next_event(engine).await;
        if !matches!(event, EngineEvent::UploadProgress { .. }) {
            return event;
        }
    }
}

#[tokio::test]
async fn upload_poll_and_download_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "jobs": [{"job_id": "J1", "filename": "cat.png", "status": "queued"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status/J1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "processing"
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status/J1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "output_path": "/converted/J1.jpeg"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/converted/J1.jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg bytes".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = dir.path().join("cat.png");
    fs::write(&source, b"png bytes").unwrap();

    let mut engine = EngineHandle::new(EngineConfig {
        client: ClientSettings {
            base_url: server.uri(),
            poll_interval: Duration::from_millis(10),
            ..ClientSettings::default()
        },
        strategy: SyncStrategy::Poll,
    })
    .expect("engine");

    engine.upload(
        7,
        vec![UploadFile {
            path: source,
            file_name: "cat.png".to_string(),
        }],
        "jpeg",
        None,
    );
    let EngineEvent::UploadFinished { batch, result } = next_outcome(&mut engine).await else {
        panic!("expected upload result");
    };
    assert_eq!(batch, 7);
    let jobs = result.expect("upload ok");
    assert_eq!(jobs[0].job_id, "J1");

    engine.track("J1");
    assert_eq!(
        next_outcome(&mut engine).await,
        EngineEvent::JobStatus {
            job_id: "J1".to_string(),
            status: RemoteStatus::Running {
                status: "processing".to_string()
            },
        }
    );
    let EngineEvent::JobStatus {
        status: RemoteStatus::Completed { output_path },
        ..
    } = next_outcome(&mut engine).await
    else {
        panic!("expected completion");
    };

    let out = dir.path().join("out");
    engine.download(3, output_path, out.clone(), "converted-cat.jpeg".to_string());
    let EngineEvent::DownloadFinished { entry, result } = next_outcome(&mut engine).await else {
        panic!("expected download result");
    };
    assert_eq!(entry, 3);
    let saved = result.expect("download ok");
    assert_eq!(saved, out.join("converted-cat.jpeg"));
    assert_eq!(fs::read(saved).unwrap(), b"jpeg bytes");

    engine.shutdown();
}

#[tokio::test]
async fn failed_download_reports_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/converted/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut engine = EngineHandle::new(EngineConfig {
        client: ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        },
        strategy: SyncStrategy::Poll,
    })
    .expect("engine");

    engine.download(
        1,
        "/converted/missing.png".to_string(),
        dir.path().to_path_buf(),
        "converted-missing.png".to_string(),
    );
    let EngineEvent::DownloadFinished { entry, result } = next_event(&mut engine).await else {
        panic!("expected download result");
    };
    assert_eq!(entry, 1);
    assert!(result.is_err());
    assert_eq!(engine.try_recv(), None);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn push_strategy_needs_http_origin() {
    let result = EngineHandle::new(EngineConfig {
        client: ClientSettings {
            base_url: "ftp://example.com".to_string(),
            ..ClientSettings::default()
        },
        strategy: SyncStrategy::Push,
    });
    assert!(result.is_err());
}

#[tokio::test]
async fn push_origin_without_websocket_reports_disconnect() {
    let server = MockServer::start().await;

    let mut engine = EngineHandle::new(EngineConfig {
        client: ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        },
        strategy: SyncStrategy::Push,
    })
    .expect("engine");

    assert_eq!(
        next_event(&mut engine).await,
        EngineEvent::PushConnection { connected: false }
    );
}
