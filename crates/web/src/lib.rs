//! Gradebook web server.
//!
//! Provides an Axum-based HTTP server with:
//! - Google sign-in (authorization code flow) with cookie sessions
//! - A server-rendered dashboard showing the student's grades
//! - A small JSON API (`/api/me`, `/api/grades`)
//! - A health endpoint

pub mod api;
pub mod pages;
pub mod session;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

use gradebook_core::config::AppConfig;
use gradebook_core::google::OAuthClient;
use gradebook_core::Gradebook;

use crate::session::{PendingLogins, Session};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub oauth: OAuthClient,
    pub gradebook: Gradebook,
    /// Signed-in students (token -> session).
    pub sessions: RwLock<HashMap<String, Session>>,
    /// Outstanding login `state` values.
    pub pending_logins: RwLock<PendingLogins>,
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server with the given dependencies.
    pub fn new(config: AppConfig, oauth: OAuthClient, gradebook: Gradebook) -> Self {
        let state = Arc::new(AppState {
            config,
            oauth,
            gradebook,
            sessions: RwLock::new(HashMap::new()),
            pending_logins: RwLock::new(PendingLogins::default()),
        });
        Self { state }
    }

    /// Build the full router with middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(pages::routes())
            .merge(api::auth::routes())
            .merge(api::grades::routes())
            .merge(api::status::routes())
            .layer(DefaultBodyLimit::max(64 * 1024))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listen_addr` until `shutdown` resolves.
    pub async fn start<F>(self, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = self.router();

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("web server stopped");
        Ok(())
    }
}
