//! Cookie-backed shop sessions.
//!
//! The cookie only carries a signed session id (`<uuid>.<hex hmac-sha256>`);
//! the cart and flash queue live server-side in a [`SessionStore`]. A missing,
//! malformed, tampered or expired cookie simply starts a fresh session.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, warn};
use ubermelon_core::session::SessionState;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session signing key is invalid: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionState>, SessionStoreError>;
    async fn save(&self, id: SessionId, state: SessionState) -> Result<(), SessionStoreError>;
    async fn remove(&self, id: &SessionId) -> Result<(), SessionStoreError>;
    async fn active_sessions(&self) -> Result<usize, SessionStoreError>;
}

struct StoredSession {
    state: SessionState,
    last_seen: DateTime<Utc>,
}

/// Sessions held in process memory. Once `max_sessions` live sessions exist,
/// storing a new one evicts the least recently seen.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, StoredSession>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

    pub fn new(idle_timeout_secs: u64) -> Self {
        let seconds = i64::try_from(idle_timeout_secs).unwrap_or(i64::MAX);
        let idle_timeout = Duration::try_seconds(seconds).unwrap_or(Duration::MAX);
        Self::with_idle_timeout(idle_timeout)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            max_sessions: Self::DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: u64) -> Self {
        self.max_sessions = usize::try_from(max_sessions).unwrap_or(usize::MAX).max(1);
        self
    }

    fn is_expired(&self, stored: &StoredSession, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(stored.last_seen) >= self.idle_timeout
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionState>, SessionStoreError> {
        let sessions = self.sessions.read().await;
        let now = Utc::now();
        Ok(sessions
            .get(id)
            .filter(|stored| !self.is_expired(stored, now))
            .map(|stored| stored.state.clone()))
    }

    async fn save(&self, id: SessionId, state: SessionState) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        if !sessions.contains_key(&id) {
            let before = sessions.len();
            sessions.retain(|_, stored| !self.is_expired(stored, now));
            let purged = before - sessions.len();
            if purged > 0 {
                debug!(event_name = "shop.session.purged", purged, "expired sessions purged");
            }

            if sessions.len() >= self.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, stored)| stored.last_seen)
                    .map(|(oldest_id, _)| *oldest_id);
                if let Some(oldest_id) = oldest {
                    sessions.remove(&oldest_id);
                    warn!(
                        event_name = "shop.session.evicted",
                        correlation_id = %oldest_id,
                        max_sessions = self.max_sessions,
                        "session store is full, evicted least recently seen session"
                    );
                }
            }
        }
        sessions.insert(id, StoredSession { state, last_seen: now });
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn active_sessions(&self) -> Result<usize, SessionStoreError> {
        let sessions = self.sessions.read().await;
        let now = Utc::now();
        Ok(sessions.values().filter(|stored| !self.is_expired(stored, now)).count())
    }
}

/// Signs and verifies session cookie values.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(key: &[u8]) -> Result<Self, SessionError> {
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|error| SessionError::InvalidKey(error.to_string()))?;
        Ok(Self { mac })
    }

    /// A signer keyed with fresh random bytes; cookies it issues do not
    /// survive a restart.
    pub fn ephemeral() -> Result<Self, SessionError> {
        let mut key = Vec::with_capacity(32);
        key.extend_from_slice(Uuid::new_v4().as_bytes());
        key.extend_from_slice(Uuid::new_v4().as_bytes());
        Self::new(&key)
    }

    pub fn sign(&self, id: &SessionId) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.to_string().as_bytes());
        format!("{id}.{}", encode_hex(mac.finalize().into_bytes().as_slice()))
    }

    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (raw_id, raw_signature) = value.split_once('.')?;
        let id = Uuid::parse_str(raw_id).ok().map(SessionId)?;
        let signature = decode_hex(raw_signature)?;

        let mut mac = self.mac.clone();
        mac.update(id.to_string().as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id)
    }
}

impl fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CookieSigner(<redacted>)")
    }
}

/// Handle to the current request's session state.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(id: SessionId, state: SessionState) -> Self {
        Self { id, state: Arc::new(Mutex::new(state)) }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "session layer is not installed"))
    }
}

#[derive(Clone)]
pub struct SessionLayerState {
    store: Arc<dyn SessionStore>,
    signer: CookieSigner,
    cookie_name: Arc<str>,
}

impl SessionLayerState {
    pub fn new(store: Arc<dyn SessionStore>, signer: CookieSigner, cookie_name: &str) -> Self {
        Self { store, signer, cookie_name: Arc::from(cookie_name) }
    }
}

/// Resolves the caller's session before the handler runs and persists it
/// afterwards. A cookie is only issued once a new session holds state.
pub async fn session_layer(
    State(layer): State<SessionLayerState>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = read_cookie(request.headers(), &layer.cookie_name)
        .and_then(|value| layer.signer.verify(value));

    let resumed = match presented {
        Some(id) => match layer.store.load(&id).await {
            Ok(Some(state)) => Some((id, state)),
            Ok(None) => {
                // Signed but unknown or expired; drop whatever is left of it.
                if let Err(error) = layer.store.remove(&id).await {
                    warn!(
                        event_name = "shop.session.remove_failed",
                        correlation_id = %id,
                        error = %error,
                        "stale session could not be removed"
                    );
                }
                None
            }
            Err(error) => {
                warn!(
                    event_name = "shop.session.load_failed",
                    correlation_id = %id,
                    error = %error,
                    "session store load failed, starting a fresh session"
                );
                None
            }
        },
        None => None,
    };
    let is_new = resumed.is_none();
    let (id, state) = resumed.unwrap_or_else(|| (SessionId::generate(), SessionState::default()));

    let session = Session::new(id, state);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let state = session.snapshot().await;
    if is_new && state == SessionState::default() {
        return response;
    }

    if let Err(error) = layer.store.save(id, state).await {
        error!(
            event_name = "shop.session.save_failed",
            correlation_id = %id,
            error = %error,
            "session store save failed"
        );
        return response;
    }

    if is_new {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            layer.cookie_name,
            layer.signer.sign(&id)
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
                debug!(event_name = "shop.session.issued", correlation_id = %id, "session cookie issued");
            }
            Err(error) => {
                error!(correlation_id = %id, error = %error, "session cookie is not a valid header");
            }
        }
    }

    response
}

fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 || !value.is_ascii() {
        return None;
    }
    (0..value.len())
        .step_by(2)
        .map(|start| value.get(start..start + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
