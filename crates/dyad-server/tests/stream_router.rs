#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use dyad_core::error::{DyadError, Result};
use dyad_core::protocol::payload::{BeginStream, ConsentDecision, McpConsentRequest};
use dyad_core::settings::SettingsStore;
use dyad_server::app_state::AppState;
use dyad_server::config::DyadConfig;
use dyad_server::realtime::PeerCtx;
use dyad_server::router;
use dyad_server::services::{ChatGenerator, ChunkStream, PlaceholderGenerator};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    addr: SocketAddr,
    state: AppState,
    _dir: tempfile::TempDir,
}

async fn spawn(generator: Arc<dyn ChatGenerator>) -> Server {
    spawn_with(DyadConfig::default(), generator).await
}

async fn spawn_with(cfg: DyadConfig, generator: Arc<dyn ChatGenerator>) -> Server {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::with_parts(cfg, SettingsStore::new(dir.path()), generator);
    let app = router::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Server { addr, state, _dir: dir }
}

fn placeholder(reply: &str, delay_ms: u64) -> Arc<dyn ChatGenerator> {
    Arc::new(PlaceholderGenerator::new(reply, Duration::from_millis(delay_ms)))
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, v: Value) {
    ws.send(Message::Text(v.to_string())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(s) = msg {
            return serde_json::from_str(&s).unwrap();
        }
    }
}

/// Asserts nothing but control frames arrive within `ms`.
async fn expect_silence(ws: &mut Ws, ms: u64) {
    let deadline = tokio::time::sleep(Duration::from_millis(ms));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return,
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(s))) => panic!("unexpected frame: {s}"),
                Some(Ok(_)) => continue,
                _ => return,
            }
        }
    }
}

fn begin(session_id: &str) -> Value {
    json!({ "type": "stream:begin", "payload": { "sessionId": session_id } })
}

#[tokio::test]
async fn begin_streams_chunk_then_end() {
    let srv = spawn(placeholder("hello", 0)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("abc")).await;

    assert_eq!(
        recv(&mut ws).await,
        json!({ "type": "stream:started", "payload": { "sessionId": "abc" } })
    );
    assert_eq!(
        recv(&mut ws).await,
        json!({ "type": "stream:chunk", "payload": { "sessionId": "abc", "chunk": "hello" } })
    );
    assert_eq!(
        recv(&mut ws).await,
        json!({ "type": "stream:end", "payload": { "sessionId": "abc" } })
    );
    expect_silence(&mut ws, 200).await;
}

#[tokio::test]
async fn chunks_arrive_in_order_and_session_can_be_reused() {
    let srv = spawn(placeholder("one two three four", 0)).await;
    let mut ws = connect(srv.addr).await;

    for _ in 0..2 {
        send(&mut ws, begin("s1")).await;
        assert_eq!(recv(&mut ws).await["type"], "stream:started");
        let mut text = String::new();
        for _ in 0..4 {
            let v = recv(&mut ws).await;
            assert_eq!(v["type"], "stream:chunk");
            assert_eq!(v["payload"]["sessionId"], "s1");
            text.push_str(v["payload"]["chunk"].as_str().unwrap());
        }
        assert_eq!(text, "one two three four");
        assert_eq!(recv(&mut ws).await["type"], "stream:end");
    }
}

#[tokio::test]
async fn cancel_yields_cancelled_as_the_only_terminal() {
    let srv = spawn(placeholder("a b c d e f g h i j k l", 100)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("slow")).await;
    assert_eq!(recv(&mut ws).await["type"], "stream:started");

    send(&mut ws, json!({ "type": "stream:cancel", "payload": { "sessionId": "slow" } })).await;

    let terminal = loop {
        let v = recv(&mut ws).await;
        if v["type"] != "stream:chunk" {
            break v;
        }
    };
    assert_eq!(
        terminal,
        json!({ "type": "stream:cancelled", "payload": { "sessionId": "slow" } })
    );
    expect_silence(&mut ws, 300).await;
}

#[tokio::test]
async fn cancel_for_unknown_session_is_silent() {
    let srv = spawn(placeholder("hi", 0)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, json!({ "type": "stream:cancel", "payload": { "sessionId": "nope" } })).await;
    send(&mut ws, begin("real")).await;

    let v = recv(&mut ws).await;
    assert_eq!(v["type"], "stream:started");
    assert_eq!(v["payload"]["sessionId"], "real");
}

#[tokio::test]
async fn duplicate_begin_is_rejected_without_ending_active_stream() {
    let srv = spawn(placeholder("x y z", 100)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("dup")).await;
    assert_eq!(recv(&mut ws).await["type"], "stream:started");
    send(&mut ws, begin("dup")).await;

    let mut saw_error = false;
    let mut chunks = 0;
    loop {
        let v = recv(&mut ws).await;
        match v["type"].as_str().unwrap() {
            "stream:error" => {
                // not correlated, so it is not a terminal for "dup"
                assert!(v["payload"].get("sessionId").is_none());
                assert_eq!(v["payload"]["code"], "STREAM_ACTIVE");
                assert!(v["payload"]["error"].as_str().unwrap().contains("dup"));
                saw_error = true;
            }
            "stream:chunk" => chunks += 1,
            "stream:end" => break,
            other => panic!("unexpected {other}"),
        }
    }
    assert!(saw_error);
    assert_eq!(chunks, 3);
    expect_silence(&mut ws, 200).await;
}

/// Streams `n` numbered chunks as fast as the connection takes them.
struct FloodGenerator(usize);

#[async_trait]
impl ChatGenerator for FloodGenerator {
    async fn generate(&self, _ctx: PeerCtx, _req: BeginStream) -> Result<ChunkStream> {
        Ok(stream::iter((0..self.0).map(|i| Ok::<_, DyadError>(i.to_string()))).boxed())
    }
}

#[tokio::test]
async fn error_replies_do_not_stall_a_full_outbound_queue() {
    const CHUNKS: usize = 20_000;
    const BAD_FRAMES: usize = 50;

    let mut cfg = DyadConfig::default();
    cfg.server.outbound_queue = 4;
    let srv = spawn_with(cfg, Arc::new(FloodGenerator(CHUNKS))).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("flood")).await;
    for _ in 0..BAD_FRAMES {
        ws.send(Message::Text("garbage".into())).await.unwrap();
    }

    let mut next_chunk = 0;
    let mut errors = 0;
    loop {
        let v = recv(&mut ws).await;
        match v["type"].as_str().unwrap() {
            "stream:started" => {}
            "stream:chunk" => {
                assert_eq!(v["payload"]["chunk"], next_chunk.to_string());
                next_chunk += 1;
            }
            "stream:error" => {
                assert_eq!(v["payload"]["code"], "BAD_REQUEST");
                errors += 1;
            }
            "stream:end" => break,
            other => panic!("unexpected {other}"),
        }
    }
    assert_eq!(next_chunk, CHUNKS);

    // error replies queued behind the last chunks may still be in flight
    while errors < BAD_FRAMES {
        assert_eq!(recv(&mut ws).await["type"], "stream:error");
        errors += 1;
    }
}

#[tokio::test]
async fn idle_timeout_fires_while_chunks_are_flowing() {
    let mut cfg = DyadConfig::default();
    cfg.server.idle_timeout_ms = 800;
    // 100 words at 50 ms each would take about 5 s
    let reply = vec!["w"; 100].join(" ");
    let srv = spawn_with(cfg, placeholder(&reply, 50)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("steady")).await;

    let mut chunks = 0;
    let closed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(s))) => {
                    let v: Value = serde_json::from_str(&s).unwrap();
                    assert_ne!(v["type"], "stream:end");
                    if v["type"] == "stream:chunk" {
                        chunks += 1;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "idle peer was never dropped");
    assert!(chunks > 0);
}

#[tokio::test]
async fn bad_frames_get_stream_error_and_connection_survives() {
    let srv = spawn(placeholder("ok", 0)).await;
    let mut ws = connect(srv.addr).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    let v = recv(&mut ws).await;
    assert_eq!(v["type"], "stream:error");
    assert_eq!(v["payload"]["code"], "BAD_REQUEST");
    assert!(v["payload"].get("sessionId").is_none());

    send(&mut ws, json!({ "type": "chat:stream", "payload": {} })).await;
    let v = recv(&mut ws).await;
    assert_eq!(v["payload"]["code"], "UNKNOWN_TYPE");
    assert!(v["payload"]["error"].as_str().unwrap().contains("chat:stream"));

    send(&mut ws, json!({ "type": "stream:begin", "payload": { "prompt": "no session" } })).await;
    assert_eq!(recv(&mut ws).await["payload"]["code"], "MALFORMED_PAYLOAD");

    send(
        &mut ws,
        json!({ "type": "stream:chunk", "payload": { "sessionId": "s", "chunk": "c" } }),
    )
    .await;
    let v = recv(&mut ws).await;
    assert_eq!(v["payload"]["code"], "UNHANDLED_TYPE");
    assert_eq!(v["payload"]["sessionId"], "s");

    ws.send(Message::Binary(vec![0, 1, 2])).await.unwrap();
    assert_eq!(recv(&mut ws).await["payload"]["code"], "BAD_REQUEST");

    send(&mut ws, begin("after")).await;
    assert_eq!(recv(&mut ws).await["type"], "stream:started");
}

struct FailingGenerator;

#[async_trait]
impl ChatGenerator for FailingGenerator {
    async fn generate(&self, _ctx: PeerCtx, _req: BeginStream) -> Result<ChunkStream> {
        let items: Vec<Result<String>> = vec![
            Ok("partial".into()),
            Err(DyadError::Internal("model unavailable".into())),
        ];
        Ok(stream::iter(items).boxed())
    }
}

#[tokio::test]
async fn generator_failure_ends_with_stream_error() {
    let srv = spawn(Arc::new(FailingGenerator)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("f")).await;
    assert_eq!(recv(&mut ws).await["type"], "stream:started");
    assert_eq!(recv(&mut ws).await["payload"]["chunk"], "partial");

    let v = recv(&mut ws).await;
    assert_eq!(v["type"], "stream:error");
    assert_eq!(v["payload"]["sessionId"], "f");
    assert_eq!(v["payload"]["code"], "INTERNAL");
    assert!(v["payload"]["error"].as_str().unwrap().contains("model unavailable"));
    expect_silence(&mut ws, 200).await;
}

/// Asks the peer for tool consent before replying.
struct ConsentGenerator;

#[async_trait]
impl ChatGenerator for ConsentGenerator {
    async fn generate(&self, ctx: PeerCtx, req: BeginStream) -> Result<ChunkStream> {
        let decision = ctx
            .request_mcp_consent(McpConsentRequest {
                request_id: format!("consent-{}", req.session_id),
                server_name: "fs".into(),
                tool_name: "read_file".into(),
                tool_description: None,
                input_preview: Some("README.md".into()),
            })
            .await?;
        let reply = match decision {
            ConsentDecision::Decline => "declined",
            _ => "accepted",
        };
        Ok(stream::iter(vec![Ok::<_, DyadError>(reply.to_owned())]).boxed())
    }
}

#[tokio::test]
async fn consent_round_trip_resolves_pending_request() {
    let srv = spawn(Arc::new(ConsentGenerator)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("c1")).await;
    assert_eq!(recv(&mut ws).await["type"], "stream:started");

    let req = recv(&mut ws).await;
    assert_eq!(req["type"], "mcp:tool-consent-request");
    assert_eq!(req["payload"]["requestId"], "consent-c1");
    assert_eq!(req["payload"]["toolName"], "read_file");

    // unknown ids are ignored
    send(
        &mut ws,
        json!({ "type": "mcp:tool-consent-response", "payload": { "requestId": "other", "decision": "decline" } }),
    )
    .await;
    send(
        &mut ws,
        json!({ "type": "mcp:tool-consent-response", "payload": { "requestId": "consent-c1", "decision": "accept-always" } }),
    )
    .await;

    assert_eq!(recv(&mut ws).await["payload"]["chunk"], "accepted");
    assert_eq!(recv(&mut ws).await["type"], "stream:end");
    assert_eq!(srv.state.consent().pending_count(), 0);
}

#[tokio::test]
async fn consent_response_from_another_connection_is_ignored() {
    let srv = spawn(Arc::new(ConsentGenerator)).await;
    let mut owner = connect(srv.addr).await;
    let mut other = connect(srv.addr).await;

    send(&mut owner, begin("c3")).await;
    assert_eq!(recv(&mut owner).await["type"], "stream:started");
    assert_eq!(recv(&mut owner).await["payload"]["requestId"], "consent-c3");

    send(
        &mut other,
        json!({ "type": "mcp:tool-consent-response", "payload": { "requestId": "consent-c3", "decision": "accept-once" } }),
    )
    .await;
    // the foreign answer is a silent no-op on its own connection
    expect_silence(&mut other, 200).await;
    expect_silence(&mut owner, 100).await;
    assert_eq!(srv.state.consent().pending_count(), 1);

    send(
        &mut owner,
        json!({ "type": "mcp:tool-consent-response", "payload": { "requestId": "consent-c3", "decision": "decline" } }),
    )
    .await;
    assert_eq!(recv(&mut owner).await["payload"]["chunk"], "declined");
    assert_eq!(recv(&mut owner).await["type"], "stream:end");
}

#[tokio::test]
async fn closing_connection_abandons_its_streams() {
    let srv = spawn(Arc::new(ConsentGenerator)).await;
    let mut ws = connect(srv.addr).await;

    send(&mut ws, begin("c2")).await;
    assert_eq!(recv(&mut ws).await["type"], "stream:started");
    assert_eq!(recv(&mut ws).await["type"], "mcp:tool-consent-request");
    assert_eq!(srv.state.consent().pending_count(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    tokio::time::timeout(Duration::from_secs(5), async {
        while srv.state.consent().pending_count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("pending consent not dropped on close");
}
