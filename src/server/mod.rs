//! HTTP front end (`server` feature).
//!
//! One axum router per [`Profile`].  Engines are built lazily through the
//! [`ModelCache`] and all synthesis runs on the blocking pool, so a slow
//! model never stalls the accept loop.

use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    cache::ModelCache,
    engine::{EngineLoader, SpeechEngine, VoiceKey},
};

pub mod config;
pub mod error;
pub mod profile;
pub mod routes;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorStyle};
pub use profile::{Plan, Profile, TtsRequest};

/// State shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    loader: Arc<dyn EngineLoader>,
    cache: ModelCache<VoiceKey, dyn SpeechEngine>,
    started: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, loader: Arc<dyn EngineLoader>) -> Self {
        Self { config, loader, cache: ModelCache::new(), started: Instant::now() }
    }

    /// State wired to the loader the profile calls for.
    pub fn from_config(config: ServerConfig) -> Self {
        let loader = config.loader();
        Self::new(config, loader)
    }

    pub fn profile(&self) -> Profile {
        self.config.profile
    }

    pub fn loader(&self) -> &dyn EngineLoader {
        self.loader.as_ref()
    }

    /// Cached engine for `key`, built on first use.  Blocking.
    pub fn engine(&self, key: VoiceKey) -> Result<Arc<dyn SpeechEngine>> {
        self.cache.get_or_load(&key, || self.loader.load(key))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let profile = state.profile();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/health", get(routes::health))
        .route(profile.tts_route(), post(routes::tts));

    app = match profile {
        Profile::Melo => app.route(profile.info_route(), get(routes::root)),
        Profile::MeloMultilang | Profile::MeloZhEn => app.route(profile.info_route(), get(routes::languages)),
        Profile::Piper | Profile::PiperDual => app.route(profile.info_route(), get(routes::models)),
    };

    app.with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Load every voice the profile serves.  Failures are logged, not fatal.
pub async fn preload(state: Arc<AppState>) {
    for key in state.profile().voice_keys() {
        let st = state.clone();
        let loaded = tokio::task::spawn_blocking(move || st.engine(key)).await;
        match loaded {
            Ok(Ok(engine)) => info!(voice = %key, engine = engine.name(), "voice preloaded"),
            Ok(Err(e)) => warn!(voice = %key, error = %format!("{e:#}"), "voice preload failed; will retry on first request"),
            Err(e) => warn!(voice = %key, error = %e, "preload task panicked"),
        }
    }
}

/// Bind, log the banner, and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(config));
    let profile = state.profile();
    let addr = state.config.addr();

    info!(profile = ?profile, service = profile.service_name(), "starting");
    if profile.is_piper() {
        info!(model_dir = %state.config.piper.model_dir.display(), "model directory");
        preload(state.clone()).await;
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;
    info!("listening on http://{addr}");
    for (method, path, purpose) in profile.routes() {
        info!("  {method:<4} {path:<10} {purpose}");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
