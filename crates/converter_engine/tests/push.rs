use std::sync::Arc;
use std::time::Duration;

use converter_engine::{
    run_push_channel, ChannelSink, ClientError, EngineEvent, EventSink, RemoteStatus,
};
use futures_util::SinkExt;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Accepts one client, sends `frames`, then either closes or holds the socket open.
async fn serve_frames(frames: Vec<&'static str>, hold_open: bool) -> (Url, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for frame in frames {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }
        if hold_open {
            tokio::time::sleep(Duration::from_secs(30)).await;
        } else {
            let _ = ws.close(None).await;
        }
    });
    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    (url, handle)
}

fn channel_sink() -> (Arc<dyn EventSink>, mpsc::UnboundedReceiver<EngineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelSink::new(tx)), rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open")
}

#[tokio::test]
async fn frames_become_events_in_arrival_order() {
    let (url, server) = serve_frames(
        vec![
            r#"{"type":"session_id","session_id":"S1"}"#,
            r#"{"type":"heartbeat"}"#,
            "not json",
            r#"{"type":"job_status","job_id":"J2","status":"error","error":"decode failed"}"#,
            r#"{"type":"job_status","job_id":"J1","status":"resizing"}"#,
            r#"{"type":"job_status","job_id":"J1","status":"completed","output_path":"/converted/J1.gif"}"#,
        ],
        false,
    )
    .await;
    let (sink, mut rx) = channel_sink();

    run_push_channel(url, sink, CancellationToken::new())
        .await
        .expect("push channel runs");
    server.await.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            EngineEvent::PushConnection { connected: true },
            EngineEvent::SessionAssigned {
                session_id: "S1".to_string()
            },
            EngineEvent::JobStatus {
                job_id: "J2".to_string(),
                status: RemoteStatus::Failed {
                    error: "decode failed".to_string()
                },
            },
            EngineEvent::JobStatus {
                job_id: "J1".to_string(),
                status: RemoteStatus::Running {
                    status: "resizing".to_string()
                },
            },
            EngineEvent::JobStatus {
                job_id: "J1".to_string(),
                status: RemoteStatus::Completed {
                    output_path: "/converted/J1.gif".to_string()
                },
            },
            EngineEvent::PushConnection { connected: false },
        ]
    );
}

#[tokio::test]
async fn cancellation_closes_the_channel() {
    let (url, server) =
        serve_frames(vec![r#"{"type":"session_id","session_id":"S9"}"#], true).await;
    let (sink, mut rx) = channel_sink();
    let cancel = CancellationToken::new();
    let channel = tokio::spawn(run_push_channel(url, sink, cancel.clone()));

    assert_eq!(
        next_event(&mut rx).await,
        EngineEvent::PushConnection { connected: true }
    );
    assert_eq!(
        next_event(&mut rx).await,
        EngineEvent::SessionAssigned {
            session_id: "S9".to_string()
        }
    );

    cancel.cancel();
    channel.await.unwrap().expect("clean shutdown");
    assert_eq!(
        drain(&mut rx),
        vec![EngineEvent::PushConnection { connected: false }]
    );
    server.abort();
}

#[tokio::test]
async fn unreachable_server_reports_disconnect_and_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let (sink, mut rx) = channel_sink();

    let result = run_push_channel(
        Url::parse(&format!("ws://{addr}/ws")).unwrap(),
        sink,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(ClientError::Transport(_))));
    assert_eq!(
        drain(&mut rx),
        vec![EngineEvent::PushConnection { connected: false }]
    );
}
