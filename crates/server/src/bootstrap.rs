use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use secrecy::ExposeSecret;
use tera::Tera;
use thiserror::Error;
use tracing::{info, warn};
use ubermelon_core::config::{AppConfig, ConfigError, LoadOptions};
use ubermelon_core::shop::catalog::{Catalog, CatalogError};

use crate::health::HealthState;
use crate::session::{CookieSigner, InMemorySessionStore, SessionError, SessionLayerState};
use crate::shop::{self, ShopState};
use crate::templates;

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub templates: Arc<Tera>,
    pub sessions: Arc<InMemorySessionStore>,
    pub cookie_signer: CookieSigner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog failed to load: {0}")]
    Catalog(#[from] CatalogError),
    #[error("templates failed to load: {0}")]
    Templates(#[source] tera::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let catalog = Catalog::load_or_builtin(config.catalog.path.as_deref())?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        melon_count = catalog.len(),
        source = %config
            .catalog
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "builtin".to_string()),
        "catalog loaded"
    );

    let templates =
        templates::init_templates(&config.templates.dir).map_err(BootstrapError::Templates)?;

    let cookie_signer = match &config.session.secret {
        Some(secret) => CookieSigner::new(secret.expose_secret().as_bytes())?,
        None => {
            warn!(
                event_name = "system.bootstrap.ephemeral_session_secret",
                correlation_id = "bootstrap",
                "session.secret is unset; sessions will not survive a restart"
            );
            CookieSigner::ephemeral()?
        }
    };

    let sessions = Arc::new(
        InMemorySessionStore::new(config.session.idle_timeout_secs)
            .with_max_sessions(config.session.max_sessions),
    );

    Ok(Application {
        config,
        catalog: Arc::new(catalog),
        templates: Arc::new(templates),
        sessions,
        cookie_signer,
    })
}

impl Application {
    pub fn shop_router(&self) -> Router {
        let sessions = SessionLayerState::new(
            self.sessions.clone(),
            self.cookie_signer.clone(),
            &self.config.session.cookie_name,
        );
        shop::router(
            ShopState::new(self.catalog.clone(), self.templates.clone()),
            sessions,
            &self.static_dir(),
        )
    }

    pub fn health_state(&self) -> HealthState {
        HealthState::new(self.catalog.clone(), self.sessions.clone())
    }

    fn static_dir(&self) -> PathBuf {
        self.config.templates.static_dir.clone()
    }
}
