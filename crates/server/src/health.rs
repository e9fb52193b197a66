use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use ubermelon_core::shop::catalog::Catalog;

use crate::session::SessionStore;

#[derive(Clone)]
pub struct HealthState {
    catalog: Arc<Catalog>,
    sessions: Arc<dyn SessionStore>,
}

impl HealthState {
    pub fn new(catalog: Arc<Catalog>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { catalog, sessions }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub catalog: HealthCheck,
    pub sessions: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = catalog_check(&state.catalog);
    let sessions = session_store_check(state.sessions.as_ref()).await;
    let ready = catalog.status == "ready" && sessions.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "ubermelon-server runtime initialized".to_string(),
        },
        catalog,
        sessions,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn catalog_check(catalog: &Catalog) -> HealthCheck {
    if catalog.is_empty() {
        return HealthCheck { status: "degraded", detail: "catalog has no melons".to_string() };
    }
    HealthCheck { status: "ready", detail: format!("{} melons loaded", catalog.len()) }
}

async fn session_store_check(sessions: &dyn SessionStore) -> HealthCheck {
    match sessions.active_sessions().await {
        Ok(count) => HealthCheck { status: "ready", detail: format!("{count} active sessions") },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("session store check failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use ubermelon_core::{session::SessionState, shop::catalog::Catalog};

    use crate::health::{health, HealthState};
    use crate::session::{InMemorySessionStore, SessionId, SessionStore, SessionStoreError};

    struct UnavailableStore;

    #[async_trait]
    impl SessionStore for UnavailableStore {
        async fn load(&self, _id: &SessionId) -> Result<Option<SessionState>, SessionStoreError> {
            Err(SessionStoreError::Unavailable("offline".to_string()))
        }

        async fn save(&self, _id: SessionId, _state: SessionState) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Unavailable("offline".to_string()))
        }

        async fn remove(&self, _id: &SessionId) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Unavailable("offline".to_string()))
        }

        async fn active_sessions(&self) -> Result<usize, SessionStoreError> {
            Err(SessionStoreError::Unavailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn health_returns_ready_with_catalog_and_store() {
        let catalog = Arc::new(Catalog::builtin().expect("catalog"));
        let store = Arc::new(InMemorySessionStore::new(60));

        let (status, Json(payload)) = health(State(HealthState::new(catalog.clone(), store))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.catalog.detail, format!("{} melons loaded", catalog.len()));
        assert_eq!(payload.sessions.detail, "0 active sessions");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_session_store_fails() {
        let catalog = Arc::new(Catalog::builtin().expect("catalog"));

        let (status, Json(payload)) =
            health(State(HealthState::new(catalog, Arc::new(UnavailableStore)))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.sessions.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_payload_serializes_every_check() {
        let catalog = Arc::new(Catalog::builtin().expect("catalog"));
        let store = Arc::new(InMemorySessionStore::new(60));

        let (_, Json(payload)) = health(State(HealthState::new(catalog, store))).await;
        let value = serde_json::to_value(&payload).expect("serialize");

        for key in ["service", "catalog", "sessions"] {
            assert_eq!(value[key]["status"], "ready", "{key} check should be ready");
        }
        assert!(value["checked_at"].as_str().is_some_and(|stamp| !stamp.is_empty()));
    }
}
