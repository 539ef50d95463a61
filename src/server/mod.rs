//! HTTP service: health probe, configuration and package routes.

pub mod error;
pub mod handlers;
pub mod health;

use crate::app::PackageService;
use crate::domain::model::PackageReport;
use crate::server::error::ApiError;
use crate::utils::error::Result;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use health::{probe_health, DEFAULT_HEALTH_URL, HEALTH_PATH};

pub const XSRF_HEADER: &str = "x-requested-with";

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PackageService>,
    pub reports: Arc<RwLock<HashMap<Uuid, PackageReport>>>,
}

impl AppState {
    pub fn new(service: PackageService) -> Self {
        Self {
            service: Arc::new(service),
            reports: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

async fn require_xsrf_header(request: Request, next: Next) -> Response {
    if request.method() == Method::POST && !request.headers().contains_key(XSRF_HEADER) {
        tracing::warn!("⚠️ Rejected POST {} without {}", request.uri().path(), XSRF_HEADER);
        return ApiError::new(
            StatusCode::FORBIDDEN,
            "Missing X-Requested-With header",
            "Send the X-Requested-With header with every upload",
        )
        .into_response();
    }
    next.run(request).await
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.service.config();
    let body_limit = config.max_upload_bytes();
    let xsrf = config.server.enable_xsrf_protection;
    let cors = config.server.enable_cors;

    let mut api = Router::new()
        .route("/api/config", get(handlers::public_config))
        .route("/api/packages", post(handlers::create_package))
        .route("/api/packages/{id}", get(handlers::get_package))
        .route("/api/packages/{id}/download", get(handlers::download_package));
    if xsrf {
        api = api.layer(middleware::from_fn(require_xsrf_header));
    }

    let app = Router::new()
        .route(HEALTH_PATH, get(handlers::health))
        .merge(api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Could not install shutdown handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub async fn serve(service: PackageService) -> Result<()> {
    service.prepare().await?;
    let address = service.config().bind_address();

    let app = router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("🚀 Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
