//! WebSocket handler for the stream channel.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS on `/ws`
//! - Lifecycle: ping/pong + idle timeout
//! - Decode each text frame once and dispatch it by kind
//! - Report decode and handler failures as `stream:error` without closing
//! - Cancel the connection's streams and consent prompts on close

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use dyad_core::{DyadError, Envelope};

use crate::app_state::AppState;
use crate::realtime::{ActiveStreams, PeerCtx};
use crate::transport::codec::{decode, Inbound};

static NEXT_PEER: AtomicU64 = AtomicU64::new(1);

const IDLE_CHECK_EVERY: Duration = Duration::from_millis(250);

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| {
        let peer = format!("peer-{}", NEXT_PEER.fetch_add(1, Ordering::Relaxed));
        let span = tracing::info_span!("ws", %peer);
        run_session(app, socket, peer).instrument(span)
    })
}

// --------------------
// Core session loop
// --------------------
async fn run_session(app: AppState, socket: WebSocket, peer: String) {
    let srv = &app.cfg().server;
    let (out_tx, out_rx) = mpsc::channel::<Message>(srv.outbound_queue);
    let (ws_tx, mut ws_rx) = socket.split();

    // The writer owns the sink so the reader may wait on a full queue.
    let mut writer = tokio::spawn(write_loop(ws_tx, out_rx).in_current_span());

    let streams = Arc::new(ActiveStreams::new());
    let ctx = PeerCtx::new(peer.as_str(), out_tx.clone(), Arc::clone(&streams), app.consent());
    let dispatcher = app.dispatcher();

    let ping_every = Duration::from_millis(srv.ping_interval_ms);
    let idle_timeout = Duration::from_millis(srv.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval(ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut idle_tick = tokio::time::interval(IDLE_CHECK_EVERY);
    idle_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();

    tracing::info!("peer connected");

    loop {
        tokio::select! {
            // writer stopped (socket gone)
            _ = &mut writer => break,

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break; };
                let msg = match incoming {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(error = %e, "transport error");
                        break;
                    }
                };

                last_activity = Instant::now();

                match decode(msg) {
                    Ok(Inbound::Envelope(env)) => {
                        let kind = env.kind();
                        let session_id = env.session_id().map(str::to_owned);
                        if let Err(e) = dispatcher.dispatch(ctx.clone(), env).await {
                            tracing::warn!(%kind, session_id = ?session_id, error = %e, "handler failed");
                            let corr = error_session(&e, session_id.as_deref());
                            if ctx.send(&Envelope::error(corr, &e)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Inbound::Ping(payload)) => {
                        if out_tx.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Inbound::Pong(_)) => {}
                    Ok(Inbound::Close) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "undecodable frame");
                        if ctx.send(&Envelope::error(None, &e)).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // ping
            _ = ping_tick.tick() => {
                if out_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            // idle timeout
            _ = idle_tick.tick() => {
                if last_activity.elapsed() >= idle_timeout {
                    tracing::info!("idle timeout");
                    break;
                }
            }
        }
    }

    writer.abort();
    let cancelled = streams.cancel_all();
    let dropped = app.consent().drop_peer(&peer);
    tracing::info!(cancelled, dropped, "peer disconnected");
}

/// Drains the outbound queue into the socket, in order.
async fn write_loop(mut ws_tx: SplitSink<WebSocket, Message>, mut out_rx: mpsc::Receiver<Message>) {
    while let Some(m) = out_rx.recv().await {
        if let Err(e) = ws_tx.send(m).await {
            tracing::debug!(error = %e, "write failed");
            return;
        }
    }
}

/// Session id to attach to a handler failure.
///
/// A rejected duplicate `stream:begin` stays uncorrelated: the session it names
/// is still live and only its own task sends that session's terminal envelope.
fn error_session<'a>(err: &DyadError, session_id: Option<&'a str>) -> Option<&'a str> {
    match err {
        DyadError::StreamActive(_) => None,
        _ => session_id,
    }
}
