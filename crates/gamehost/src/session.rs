//! Session registry: tokens, sockets, and session lifetimes
//!
//! Each session pairs a token with a running game task and at most one
//! socket. Closing a socket only starts a grace window; a reconnect with the
//! token before the deadline reattaches and replays the last batch. Expired
//! sessions are destroyed by one periodic sweeper.

use cellquest_core::types::Response;
use cellquest_core::SessionToken;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::context::ExecutionContext;
use crate::engine::{EngineConfig, EngineLinks, GameEngine};
use crate::error::{ConnectError, EngineError};
use crate::game::Game;
use crate::outlet::{self, Outlet, SharedOutlet, SocketTx};
use crate::ratelimit::ConnectLimiter;
use crate::store::SaveStore;

/// Default reconnect grace window (one day)
pub const DEFAULT_GRACE: Duration = Duration::from_secs(24 * 60 * 60);
/// Default sweep period
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub grace: Duration,
    pub sweep_interval: Duration,
    pub engine: EngineConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            engine: EngineConfig::default(),
        }
    }
}

/// One accepted socket, as seen by the registry
pub struct Connection {
    pub id: u64,
    pub socket: SocketTx,
    pub peer: IpAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected { conn_id: u64 },
    Disconnected { deadline: Instant },
}

struct Session {
    id: u64,
    state: SessionState,
    outlet: SharedOutlet,
    responses: mpsc::UnboundedSender<Response>,
    task: Option<JoinHandle<()>>,
}

/// Where a new session's saved state comes from
enum Resume {
    Fresh,
    /// Blob carried over from an expired session
    Carried(Value),
    /// Look up the store under a token we no longer know
    Load(String),
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionToken, Session>>,
    game: Arc<dyn Game>,
    store: Arc<dyn SaveStore>,
    context: ExecutionContext,
    limiter: ConnectLimiter,
    config: RegistryConfig,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        game: Arc<dyn Game>,
        store: Arc<dyn SaveStore>,
        context: ExecutionContext,
        limiter: ConnectLimiter,
        config: RegistryConfig,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            game,
            store,
            context,
            limiter,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach a socket to a session, creating one when needed
    ///
    /// A live token resumes its session (taking it over from another socket
    /// if necessary). An absent, malformed, unknown or expired token yields a
    /// brand-new session. The token is always sent before any output.
    pub async fn connect(
        self: &Arc<Self>,
        token: Option<&str>,
        conn: Connection,
    ) -> Result<SessionToken, ConnectError> {
        let requested = token.and_then(|raw| match raw.parse::<SessionToken>() {
            Ok(t) => Some(t),
            Err(_) => {
                tracing::debug!("Ignoring malformed token from {}", conn.peer);
                None
            }
        });

        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let mut expired = None;

        if let Some(tok) = requested {
            match sessions.get(&tok).map(|s| s.state) {
                Some(SessionState::Disconnected { deadline }) if deadline <= now => {
                    tracing::info!("Session {} expired before reconnect", tok.short());
                    expired = sessions.remove(&tok).map(|s| (tok, s));
                }
                Some(previous) => {
                    if let Some(session) = sessions.get_mut(&tok) {
                        let mut out = outlet::lock(&session.outlet);
                        match previous {
                            SessionState::Connected { conn_id } => {
                                tracing::info!(
                                    "Session {} taken over by connection {} (was {})",
                                    tok.short(),
                                    conn.id,
                                    conn_id
                                );
                                out.close();
                            }
                            SessionState::Disconnected { .. } => {
                                tracing::info!("Session {} resumed from {}", tok.short(), conn.peer);
                            }
                        }
                        out.attach(conn.socket, &tok);
                        drop(out);
                        session.state = SessionState::Connected { conn_id: conn.id };
                    }
                    return Ok(tok);
                }
                None => {}
            }
        }

        if let Err(e) = self.limiter.check(conn.peer) {
            drop(sessions);
            if let Some((tok, session)) = expired {
                self.teardown(tok, session, true).await;
            }
            return Err(e);
        }

        let resume = match (&expired, requested) {
            (Some((_, old)), _) => outlet::lock(&old.outlet)
                .persistable()
                .map_or(Resume::Fresh, Resume::Carried),
            (None, Some(unknown)) => Resume::Load(unknown.to_hex()),
            (None, None) => Resume::Fresh,
        };

        let token = loop {
            let candidate = SessionToken::generate();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let outlet = Outlet::shared(None);
        outlet::lock(&outlet).attach(conn.socket, &token);

        let (responses, resp_rx) = mpsc::unbounded_channel();
        let links = EngineLinks {
            outlet: outlet.clone(),
            responses: resp_rx,
            context: self.context.clone(),
            store: self.store.clone(),
        };
        let engine = GameEngine::new(id, token.to_hex(), links, self.config.engine.clone());
        let task = tokio::spawn(run_session(Arc::downgrade(self), token, id, engine, resume));

        sessions.insert(
            token,
            Session {
                id,
                state: SessionState::Connected { conn_id: conn.id },
                outlet,
                responses,
                task: Some(task),
            },
        );
        tracing::info!("Created session {} for {} ({} active)", token.short(), conn.peer, sessions.len());
        drop(sessions);

        if let Some((tok, session)) = expired {
            self.teardown(tok, session, true).await;
        }
        Ok(token)
    }

    /// Socket `conn_id` closed: start the grace window
    ///
    /// Ignored unless `conn_id` is the socket currently attached.
    pub async fn disconnect(&self, token: &SessionToken, conn_id: u64) {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(token) else {
            return;
        };
        if session.state != (SessionState::Connected { conn_id }) {
            tracing::debug!("Ignoring close of superseded connection {}", conn_id);
            return;
        }
        session.state = SessionState::Disconnected {
            deadline: Instant::now() + self.config.grace,
        };
        outlet::lock(&session.outlet).detach();
        tracing::info!("Session {} disconnected, kept for {:?}", token.short(), self.config.grace);
    }

    /// Client says it is going away; same as a close
    pub async fn reset(&self, token: &SessionToken, conn_id: u64) {
        self.disconnect(token, conn_id).await;
    }

    /// Hand a response to the session's engine
    ///
    /// Returns false when the session is gone or `conn_id` is not attached.
    pub async fn respond(&self, token: &SessionToken, conn_id: u64, response: Response) -> bool {
        let sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(session) if session.state == (SessionState::Connected { conn_id }) => {
                session.responses.send(response).is_ok()
            }
            _ => {
                tracing::debug!("Dropping response for detached session {}", token.short());
                false
            }
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn state(&self, token: &SessionToken) -> Option<SessionState> {
        self.sessions.lock().await.get(token).map(|s| s.state)
    }

    /// Cleanup task that periodically destroys expired sessions
    pub fn spawn_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            loop {
                interval.tick().await;
                let destroyed = self.sweep_expired().await;
                if destroyed > 0 {
                    tracing::info!("Swept {} expired sessions", destroyed);
                }
            }
        })
    }

    /// Destroy every session whose grace window has elapsed
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(SessionToken, Session)> = {
            let mut sessions = self.sessions.lock().await;
            let tokens: Vec<SessionToken> = sessions
                .iter()
                .filter(|(_, s)| matches!(s.state, SessionState::Disconnected { deadline } if deadline <= now))
                .map(|(t, _)| *t)
                .collect();
            tokens
                .into_iter()
                .filter_map(|t| sessions.remove(&t).map(|s| (t, s)))
                .collect()
        };

        let count = expired.len();
        for (token, session) in expired {
            self.teardown(token, session, true).await;
        }
        count
    }

    /// Destroy all sessions, persisting living players
    pub async fn shutdown(&self) {
        let all: Vec<(SessionToken, Session)> = self.sessions.lock().await.drain().collect();
        tracing::info!("Shutting down {} sessions", all.len());
        for (token, session) in all {
            self.teardown(token, session, true).await;
        }
    }

    /// The game script returned; destroy its session
    async fn finish(&self, token: SessionToken, id: u64) {
        let session = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(&token) {
                Some(s) if s.id == id => sessions.remove(&token),
                _ => None,
            }
        };
        if let Some(session) = session {
            self.teardown(token, session, false).await;
        }
    }

    /// Final step for a session already removed from the map
    async fn teardown(&self, token: SessionToken, mut session: Session, abort: bool) {
        if abort {
            if let Some(task) = session.task.take() {
                task.abort();
            }
        }

        let blob = {
            let mut out = outlet::lock(&session.outlet);
            out.close();
            out.persistable()
        };
        if let Some(blob) = blob {
            match self.store.save(&token.to_hex(), &blob).await {
                Ok(()) => tracing::debug!("Persisted session {}", token.short()),
                Err(e) => tracing::warn!("Failed to persist session {}: {}", token.short(), e),
            }
        }
        tracing::info!("Session {} destroyed", token.short());
    }
}

/// Body of a session task: run the script once, then destroy the session
async fn run_session(
    registry: Weak<SessionRegistry>,
    token: SessionToken,
    id: u64,
    mut engine: GameEngine,
    resume: Resume,
) {
    let Some(game) = registry.upgrade().map(|r| r.game.clone()) else {
        return;
    };

    let saved = match resume {
        Resume::Fresh => None,
        Resume::Carried(blob) => Some(blob),
        Resume::Load(key) => {
            let store = registry.upgrade().map(|r| r.store.clone());
            match store {
                Some(store) => store.load(&key).await.unwrap_or_else(|e| {
                    tracing::warn!("Failed to load save {}: {}", &key[..8.min(key.len())], e);
                    None
                }),
                None => None,
            }
        }
    };

    engine.begin_turn().await;
    let outcome = AssertUnwindSafe(game.run(&mut engine, saved)).catch_unwind().await;
    match outcome {
        Ok(Ok(())) => tracing::info!("Game finished for session {}", token.short()),
        Ok(Err(e)) => tracing::warn!("Game for session {} ended with error: {}", token.short(), e),
        Err(payload) => tracing::error!(
            "Game for session {} failed: {}",
            token.short(),
            EngineError::from_panic(payload)
        ),
    }
    engine.finish();
    drop(engine);

    if let Some(registry) = registry.upgrade() {
        registry.finish(token, id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlet::Outbound;
    use crate::store::test_stores::FailingStore;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use cellquest_core::types::{InputValue, RenderCommand, ServerControl, ServerMessage};
    use serde_json::json;
    use std::net::Ipv4Addr;
    use tokio::time::timeout;

    /// Prints a welcome, then reports every key; 'q' ends, 'p' panics
    struct WelcomeGame {
        seen: mpsc::UnboundedSender<(Option<Value>, char)>,
    }

    #[async_trait]
    impl Game for WelcomeGame {
        async fn run(&self, engine: &mut GameEngine, saved: Option<Value>) -> Result<(), EngineError> {
            engine.print("Welcome!");
            loop {
                let key = engine.get_key(None).await?;
                engine.checkpoint(json!({ "last": key.to_string() }));
                let _ = self.seen.send((saved.clone(), key));
                match key {
                    'q' => return Ok(()),
                    'p' => panic!("script bug"),
                    'd' => engine.set_player_alive(false),
                    _ => {}
                }
            }
        }
    }

    struct Fixture {
        registry: Arc<SessionRegistry>,
        seen: mpsc::UnboundedReceiver<(Option<Value>, char)>,
        store: MemoryStore,
        context: ExecutionContext,
    }

    fn fixture_with(limiter: ConnectLimiter) -> Fixture {
        let (tx, seen) = mpsc::unbounded_channel();
        let store = MemoryStore::new();
        let context = ExecutionContext::new();
        let config = RegistryConfig {
            grace: Duration::from_secs(60),
            ..Default::default()
        };
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(WelcomeGame { seen: tx }),
            Arc::new(store.clone()),
            context.clone(),
            limiter,
            config,
        ));
        Fixture {
            registry,
            seen,
            store,
            context,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ConnectLimiter::unlimited())
    }

    fn conn(id: u64) -> (Connection, mpsc::UnboundedReceiver<Outbound>) {
        let (socket, rx) = mpsc::unbounded_channel();
        let peer = IpAddr::V4(Ipv4Addr::LOCALHOST);
        (Connection { id, socket, peer }, rx)
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Outbound {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for outbound")
            .expect("socket channel closed")
    }

    fn key(c: char) -> Response {
        Response {
            input: InputValue::Text(c.to_string()),
            epoch: None,
        }
    }

    fn welcome_batch() -> Outbound {
        Outbound::Message(ServerMessage::Batch(vec![
            RenderCommand::print("Welcome!"),
            RenderCommand::GetKey { options: None, epoch: 1 },
        ]))
    }

    #[tokio::test]
    async fn test_new_session_sends_token_then_output() {
        let f = fixture();
        let (c, mut rx) = conn(1);
        let token = f.registry.connect(None, c).await.unwrap();

        assert_eq!(
            recv(&mut rx).await,
            Outbound::Message(ServerMessage::Control(ServerControl::Token { token: token.to_hex() }))
        );
        assert_eq!(recv(&mut rx).await, welcome_batch());
        assert_eq!(f.registry.state(&token).await, Some(SessionState::Connected { conn_id: 1 }));
    }

    #[tokio::test]
    async fn test_unknown_tokens_create_distinct_sessions() {
        let f = fixture();
        let unknown = SessionToken::generate();
        let (c1, _rx1) = conn(1);
        let (c2, _rx2) = conn(2);
        let (c3, _rx3) = conn(3);

        let a = f.registry.connect(Some("not-a-token"), c1).await.unwrap();
        let b = f.registry.connect(Some(&unknown.to_hex()), c2).await.unwrap();
        let c = f.registry.connect(None, c3).await.unwrap();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_ne!(b, unknown);
        assert_eq!(f.registry.session_count().await, 3);
    }

    #[tokio::test]
    async fn test_unknown_token_loads_save() {
        let mut f = fixture();
        let old = SessionToken::generate();
        f.store.save(&old.to_hex(), &json!({"last": "z"})).await.unwrap();

        let (c, mut rx) = conn(1);
        let token = f.registry.connect(Some(&old.to_hex()), c).await.unwrap();
        recv(&mut rx).await;
        recv(&mut rx).await;

        assert!(f.registry.respond(&token, 1, key('a')).await);
        let (saved, k) = f.seen.recv().await.unwrap();
        assert_eq!(saved, Some(json!({"last": "z"})));
        assert_eq!(k, 'a');
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_before_deadline_replays_once() {
        let f = fixture();
        let (c1, mut rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;

        f.registry.disconnect(&token, 1).await;
        assert!(matches!(
            f.registry.state(&token).await,
            Some(SessionState::Disconnected { .. })
        ));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(f.registry.sweep_expired().await, 0);

        let (c2, mut rx2) = conn(2);
        let resumed = f.registry.connect(Some(&token.to_hex()), c2).await.unwrap();
        assert_eq!(resumed, token);
        assert_eq!(
            recv(&mut rx2).await,
            Outbound::Message(ServerMessage::token(token.to_hex()))
        );
        assert_eq!(recv(&mut rx2).await, welcome_batch());
        tokio::task::yield_now().await;
        assert!(rx2.try_recv().is_err());

        // the grace deadline no longer applies
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(f.registry.sweep_expired().await, 0);
        assert_eq!(f.registry.state(&token).await, Some(SessionState::Connected { conn_id: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_deadline_is_new_session() {
        let mut f = fixture();
        let (c1, mut rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;
        f.registry.respond(&token, 1, key('a')).await;
        f.seen.recv().await.unwrap();

        f.registry.disconnect(&token, 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let (c2, mut rx2) = conn(2);
        let fresh = f.registry.connect(Some(&token.to_hex()), c2).await.unwrap();
        assert_ne!(fresh, token);
        assert_eq!(f.registry.session_count().await, 1);
        assert_eq!(
            recv(&mut rx2).await,
            Outbound::Message(ServerMessage::token(fresh.to_hex()))
        );

        // old session was persisted, and its checkpoint carried over
        assert_eq!(
            f.store.load(&token.to_hex()).await.unwrap(),
            Some(json!({"last": "a"}))
        );
        recv(&mut rx2).await;
        f.registry.respond(&fresh, 2, key('b')).await;
        let (saved, _) = f.seen.recv().await.unwrap();
        assert_eq!(saved, Some(json!({"last": "a"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_destroys_and_persists() {
        let mut f = fixture();
        let (c1, mut rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;
        f.registry.respond(&token, 1, key('x')).await;
        f.seen.recv().await.unwrap();

        f.registry.disconnect(&token, 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(f.registry.sweep_expired().await, 1);
        assert_eq!(f.registry.session_count().await, 0);
        assert_eq!(
            f.store.load(&token.to_hex()).await.unwrap(),
            Some(json!({"last": "x"}))
        );
        // destroyed exactly once
        assert_eq!(f.registry.sweep_expired().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_player_not_persisted() {
        let mut f = fixture();
        let (c1, mut rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;
        f.registry.respond(&token, 1, key('d')).await;
        f.seen.recv().await.unwrap();

        f.registry.disconnect(&token, 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        f.registry.sweep_expired().await;
        assert_eq!(f.store.count().await, 0);
    }

    #[tokio::test]
    async fn test_takeover_ignores_old_close() {
        let f = fixture();
        let (c1, mut rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;

        let (c2, mut rx2) = conn(2);
        f.registry.connect(Some(&token.to_hex()), c2).await.unwrap();
        assert_eq!(recv(&mut rx1).await, Outbound::Close);
        recv(&mut rx2).await;

        f.registry.disconnect(&token, 1).await;
        assert_eq!(f.registry.state(&token).await, Some(SessionState::Connected { conn_id: 2 }));
        assert!(!f.registry.respond(&token, 1, key('a')).await);
        assert!(f.registry.respond(&token, 2, key('a')).await);
    }

    #[tokio::test]
    async fn test_reset_starts_grace_window() {
        let f = fixture();
        let (c1, _rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        f.registry.reset(&token, 1).await;
        assert!(matches!(
            f.registry.state(&token).await,
            Some(SessionState::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_new_sessions_only() {
        let f = fixture_with(ConnectLimiter::new(1));
        let (c1, _rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();

        let (c2, _rx2) = conn(2);
        assert!(matches!(
            f.registry.connect(None, c2).await,
            Err(ConnectError::RateLimited(_))
        ));

        f.registry.disconnect(&token, 1).await;
        let (c3, _rx3) = conn(3);
        assert_eq!(f.registry.connect(Some(&token.to_hex()), c3).await.unwrap(), token);
    }

    #[tokio::test]
    async fn test_script_exit_destroys_session() {
        let mut f = fixture();
        let (c1, mut rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;

        f.registry.respond(&token, 1, key('q')).await;
        f.seen.recv().await.unwrap();
        assert_eq!(recv(&mut rx1).await, Outbound::Close);
        assert_eq!(f.registry.session_count().await, 0);
        // still alive with a checkpoint, so it was persisted
        assert!(f.store.load(&token.to_hex()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_panicking_script_is_isolated() {
        let mut f = fixture();
        let (c1, mut rx1) = conn(1);
        let a = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;

        f.registry.respond(&a, 1, key('p')).await;
        f.seen.recv().await.unwrap();
        assert_eq!(recv(&mut rx1).await, Outbound::Close);
        assert_eq!(f.context.owner(), None);

        // other sessions keep working
        let (c2, mut rx2) = conn(2);
        let b = f.registry.connect(None, c2).await.unwrap();
        recv(&mut rx2).await;
        assert_eq!(recv(&mut rx2).await, welcome_batch());
        assert!(f.registry.respond(&b, 2, key('k')).await);
        assert_eq!(f.seen.recv().await.unwrap().1, 'k');
    }

    #[tokio::test]
    async fn test_shutdown_persists_and_closes() {
        let mut f = fixture();
        let (c1, mut rx1) = conn(1);
        let token = f.registry.connect(None, c1).await.unwrap();
        recv(&mut rx1).await;
        recv(&mut rx1).await;
        f.registry.respond(&token, 1, key('s')).await;
        f.seen.recv().await.unwrap();

        f.registry.shutdown().await;
        assert_eq!(f.registry.session_count().await, 0);
        assert!(f.store.load(&token.to_hex()).await.unwrap().is_some());

        let mut saw_close = false;
        while let Ok(out) = rx1.try_recv() {
            saw_close |= out == Outbound::Close;
        }
        assert!(saw_close);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_are_not_fatal() {
        let (tx, mut seen) = mpsc::unbounded_channel();
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(WelcomeGame { seen: tx }),
            Arc::new(FailingStore),
            ExecutionContext::new(),
            ConnectLimiter::unlimited(),
            RegistryConfig {
                grace: Duration::from_secs(60),
                ..Default::default()
            },
        ));

        // the save cannot be read, so play starts over
        let stored = SessionToken::generate().to_hex();
        let (c1, mut rx1) = conn(1);
        let token = registry.connect(Some(&stored), c1).await.unwrap();
        recv(&mut rx1).await;
        assert_eq!(recv(&mut rx1).await, welcome_batch());
        registry.respond(&token, 1, key('x')).await;
        assert_eq!(seen.recv().await.unwrap(), (None, 'x'));

        // the write at teardown fails, the session is destroyed anyway
        registry.disconnect(&token, 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(registry.sweep_expired().await, 1);
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.state(&token).await, None);
    }
}
