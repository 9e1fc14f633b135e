//! WebSocket front end
//!
//! One JSON document per text frame. Each socket gets a writer task fed by
//! an unbounded channel; the registry and the session's engine push frames
//! into it, and the read loop forwards client messages to the registry.

use anyhow::{Context, Result};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use cellquest_core::protocol::{CLOSE_SESSION_ENDED, MAX_MESSAGE_SIZE};
use cellquest_core::types::ControlMessage;
use cellquest_core::{ClientMessage, MessageCodec, SessionToken};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, trace, warn};

use crate::outlet::Outbound;
use crate::session::{Connection, SessionRegistry};

/// Default time a socket may stay silent before it is dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// How long to wait for queued frames to drain when a socket ends
const WRITER_DRAIN: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    registry: Arc<SessionRegistry>,
    idle_timeout: Duration,
    next_conn: Arc<AtomicU64>,
}

/// Build the HTTP router: `/ws` for games, `/healthz` for probes
pub fn router(registry: Arc<SessionRegistry>, idle_timeout: Duration) -> Router {
    let state = AppState {
        registry,
        idle_timeout,
        next_conn: Arc::new(AtomicU64::new(1)),
    };

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("Game server listening on ws://{}/ws", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Game server stopped")
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    format!("ok {}\n", state.registry.session_count().await)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> axum::response::Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, peer, state))
}

async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let conn_id = state.next_conn.fetch_add(1, Ordering::SeqCst);
    debug!(conn = conn_id, "Socket opened from {}", peer);

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Message(msg) => {
                    let frame = match MessageCodec::encode_server(&msg) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(conn = conn_id, "Failed to encode frame: {}", e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(close_with(close_code::NORMAL, CLOSE_SESSION_ENDED)).await;
                    break;
                }
                Outbound::Refuse => {
                    let _ = sink.send(close_with(close_code::POLICY, "rate limited")).await;
                    break;
                }
            }
        }
        // a bare close: the session, if any, stays resumable
        let _ = sink.close().await;
    });

    let mut bound: Option<SessionToken> = None;

    loop {
        let frame = match tokio::time::timeout(state.idle_timeout, stream.next()).await {
            Err(_) => {
                info!(conn = conn_id, "Socket idle for {:?}, dropping", state.idle_timeout);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(conn = conn_id, "Socket error: {}", e);
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Binary(_) => {
                warn!(conn = conn_id, "Ignoring binary frame");
                continue;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };

        let msg = match MessageCodec::decode_client(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(conn = conn_id, "Dropping malformed message: {}", e);
                continue;
            }
        };

        match msg {
            ClientMessage::Control(ControlMessage::Connect { token }) => {
                if let Some(previous) = bound.take() {
                    state.registry.disconnect(&previous, conn_id).await;
                }
                let conn = Connection {
                    id: conn_id,
                    socket: tx.clone(),
                    peer: peer.ip(),
                };
                match state.registry.connect(token.as_deref(), conn).await {
                    Ok(token) => bound = Some(token),
                    Err(e) => {
                        warn!(conn = conn_id, "Refusing connect: {}", e);
                        let _ = tx.send(Outbound::Refuse);
                        break;
                    }
                }
            }
            ClientMessage::Control(ControlMessage::Keepalive) => {
                trace!(conn = conn_id, "Keepalive");
            }
            ClientMessage::Control(ControlMessage::Reset) => {
                if let Some(token) = bound.take() {
                    state.registry.reset(&token, conn_id).await;
                }
            }
            ClientMessage::Response(response) => match &bound {
                Some(token) => {
                    state.registry.respond(token, conn_id, response).await;
                }
                None => warn!(conn = conn_id, "Response before connect, dropping"),
            },
        }
    }

    if let Some(token) = bound.take() {
        state.registry.disconnect(&token, conn_id).await;
    }
    drop(tx);
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        debug!(conn = conn_id, "Writer did not drain in time");
    }
    debug!(conn = conn_id, "Socket closed");
}

fn close_with(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
