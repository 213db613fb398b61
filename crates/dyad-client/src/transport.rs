//! Client side of the stream channel.
//!
//! One supervisor task owns the connection: connect, pump frames, and on any
//! close wait a fixed delay before the next attempt. Callers hold a cheap
//! [`StreamTransport`] handle; sends never queue while the state is not `OPEN`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use dyad_core::error::{DyadError, Result};
use dyad_core::protocol::payload::{
    AgentConsentRequest, BeginStream, ConsentDecision, ConsentResponse, McpConsentRequest,
    ProblemsUpdate, SessionRef, StreamChunk, StreamError, TelemetryEvent, TodosUpdate,
};
use dyad_core::{Envelope, MessageKind};

use crate::config::ClientConfig;
use crate::registry::{ListenerRegistry, Subscription};
use crate::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to the client transport. Clones share one connection.
#[derive(Clone)]
pub struct StreamTransport {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: ClientConfig,
    registry: Arc<ListenerRegistry>,
    state_tx: watch::Sender<ConnectionState>,
    conn: Mutex<Option<Connection>>,
    epoch: AtomicU64,
    shutdown: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

struct Connection {
    epoch: u64,
    tx: mpsc::Sender<Message>,
}

impl StreamTransport {
    /// Starts the supervisor task. Must be called inside a tokio runtime.
    pub fn start(cfg: ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let inner = Arc::new(Inner {
            cfg,
            registry: ListenerRegistry::new(),
            state_tx,
            conn: Mutex::new(None),
            epoch: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            supervisor: Mutex::new(None),
        });

        let handle = tokio::spawn(run_connection_loop(Arc::clone(&inner)));
        *lock(&inner.supervisor) = Some(handle);

        Self { inner }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.cfg
    }

    /// Registers `listener` for `kind`. Listeners run on the supervisor task,
    /// in frame order, and must not block.
    pub fn subscribe<F>(&self, kind: MessageKind, listener: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(kind, Arc::new(listener))
    }

    /// Sends one envelope on the current connection.
    ///
    /// Fails with `NotConnected` naming the state unless it is `OPEN`.
    pub fn publish(&self, env: &Envelope) -> Result<()> {
        let text = env.encode()?;

        let guard = lock(&self.inner.conn);
        let state = self.state();
        let Some(conn) = guard.as_ref().filter(|_| state.is_open()) else {
            return Err(DyadError::NotConnected(state.as_str()));
        };

        conn.tx.try_send(Message::Text(text)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                DyadError::Internal("outbound queue full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                DyadError::NotConnected(ConnectionState::Disconnected.as_str())
            }
        })
    }

    /// Stops reconnecting, closes the connection and waits for the supervisor.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = lock(&self.inner.supervisor).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "transport supervisor ended abnormally");
            }
        }
    }

    // ---- outbound helpers

    pub fn begin_stream(&self, req: BeginStream) -> Result<()> {
        self.publish(&Envelope::StreamBegin(req))
    }

    pub fn cancel_stream(&self, session_id: &str) -> Result<()> {
        self.publish(&Envelope::StreamCancel(SessionRef {
            session_id: session_id.to_owned(),
        }))
    }

    pub fn respond_to_mcp_consent(&self, request_id: &str, decision: ConsentDecision) -> Result<()> {
        self.publish(&Envelope::McpConsentResponse(ConsentResponse {
            request_id: request_id.to_owned(),
            decision,
        }))
    }

    pub fn respond_to_agent_consent(
        &self,
        request_id: &str,
        decision: ConsentDecision,
    ) -> Result<()> {
        self.publish(&Envelope::AgentConsentResponse(ConsentResponse {
            request_id: request_id.to_owned(),
            decision,
        }))
    }

    // ---- inbound helpers

    pub fn on_stream_started<F>(&self, f: F) -> Subscription
    where
        F: Fn(&SessionRef) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::StreamStarted, move |env| {
            if let Envelope::StreamStarted(p) = env {
                f(p);
            }
        })
    }

    pub fn on_stream_chunk<F>(&self, f: F) -> Subscription
    where
        F: Fn(&StreamChunk) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::StreamChunk, move |env| {
            if let Envelope::StreamChunk(p) = env {
                f(p);
            }
        })
    }

    pub fn on_stream_end<F>(&self, f: F) -> Subscription
    where
        F: Fn(&SessionRef) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::StreamEnd, move |env| {
            if let Envelope::StreamEnd(p) = env {
                f(p);
            }
        })
    }

    pub fn on_stream_error<F>(&self, f: F) -> Subscription
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::StreamError, move |env| {
            if let Envelope::StreamError(p) = env {
                f(p);
            }
        })
    }

    pub fn on_stream_cancelled<F>(&self, f: F) -> Subscription
    where
        F: Fn(&SessionRef) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::StreamCancelled, move |env| {
            if let Envelope::StreamCancelled(p) = env {
                f(p);
            }
        })
    }

    pub fn on_mcp_tool_consent_request<F>(&self, f: F) -> Subscription
    where
        F: Fn(&McpConsentRequest) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::McpConsentRequest, move |env| {
            if let Envelope::McpConsentRequest(p) = env {
                f(p);
            }
        })
    }

    pub fn on_agent_consent_request<F>(&self, f: F) -> Subscription
    where
        F: Fn(&AgentConsentRequest) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::AgentConsentRequest, move |env| {
            if let Envelope::AgentConsentRequest(p) = env {
                f(p);
            }
        })
    }

    pub fn on_agent_todos_update<F>(&self, f: F) -> Subscription
    where
        F: Fn(&TodosUpdate) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::AgentTodosUpdate, move |env| {
            if let Envelope::AgentTodosUpdate(p) = env {
                f(p);
            }
        })
    }

    pub fn on_agent_problems_update<F>(&self, f: F) -> Subscription
    where
        F: Fn(&ProblemsUpdate) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::AgentProblemsUpdate, move |env| {
            if let Envelope::AgentProblemsUpdate(p) = env {
                f(p);
            }
        })
    }

    pub fn on_telemetry_event<F>(&self, f: F) -> Subscription
    where
        F: Fn(&TelemetryEvent) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::TelemetryEvent, move |env| {
            if let Envelope::TelemetryEvent(p) = env {
                f(p);
            }
        })
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let prev = self.state_tx.send_replace(state);
        if prev != state {
            tracing::debug!(from = %prev, to = %state, "transport state");
        }
    }

    fn on_open(&self, tx: mpsc::Sender<Message>) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let mut conn = lock(&self.conn);
        *conn = Some(Connection { epoch, tx });
        self.set_state(ConnectionState::Open);
        epoch
    }

    /// Clears the handle and flips to `next` under the same lock `publish`
    /// takes, so a send never sees `OPEN` without a live connection.
    fn on_closed(&self, epoch: u64, next: ConnectionState) {
        let mut conn = lock(&self.conn);
        if conn.as_ref().is_some_and(|c| c.epoch == epoch) {
            *conn = None;
        }
        self.set_state(next);
    }

    fn dispatch_text(&self, epoch: u64, text: &str) {
        if self.epoch.load(Ordering::Acquire) != epoch {
            return;
        }
        match Envelope::decode(text) {
            Ok(env) => {
                let n = self.registry.dispatch(&env);
                tracing::trace!(kind = %env.kind(), listeners = n, "dispatched");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connect, pump, and reconnect after a fixed delay until shutdown.
async fn run_connection_loop(inner: Arc<Inner>) {
    let url = inner.cfg.url.clone();
    let delay = inner.cfg.reconnect_delay;

    loop {
        if inner.shutdown.is_cancelled() {
            break;
        }

        inner.set_state(ConnectionState::Connecting);

        let attempt = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            res = connect_async(url.as_str()) => res,
        };

        match attempt {
            Ok((ws, _)) => {
                let (tx, rx) = mpsc::channel(inner.cfg.outbound_queue.max(1));
                let epoch = inner.on_open(tx);
                tracing::info!(%url, epoch, "connected");

                let shutdown_requested = run_message_loop(&inner, epoch, ws, rx).await;
                inner.on_closed(epoch, ConnectionState::Disconnected);
                if shutdown_requested {
                    break;
                }
                tracing::warn!(%url, epoch, "disconnected");
            }
            Err(e) => {
                inner.set_state(ConnectionState::Disconnected);
                tracing::warn!(%url, error = %e, "connect failed");
            }
        }

        tracing::info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = inner.shutdown.cancelled() => break,
        }
    }

    inner.set_state(ConnectionState::Disconnected);
    tracing::info!("transport stopped");
}

/// Returns `true` if the loop ended because of shutdown.
async fn run_message_loop(
    inner: &Inner,
    epoch: u64,
    ws: WsStream,
    mut rx: mpsc::Receiver<Message>,
) -> bool {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => {
                inner.set_state(ConnectionState::Closing);
                let _ = write.send(Message::Close(None)).await;
                return true;
            }

            Some(msg) = rx.recv() => {
                if let Err(e) = write.send(msg).await {
                    tracing::warn!(error = %e, "send failed");
                    return false;
                }
            }

            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => inner.dispatch_text(epoch, &text),
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket error");
                        return false;
                    }
                }
            }
        }
    }
}
