//! Managed federation config protocol endpoints
//!
//! Stateless axum layer over the registry: every handler reads a snapshot
//! or a single entry and renders a protocol DTO. Lookup failures are 500,
//! not 404; the gateway's polling protocol expects that status.

pub mod handlers;

use crate::registry::{Identity, Registry};
use crate::{GraphfedError, Result};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Request-scoped failures of the config protocol endpoints
///
/// Everything renders as 500 with an empty body; that is what the polling
/// gateway understands.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No backend registered for {0}")]
    UnknownService(Identity),

    #[error("Schema for {0} has not been fetched yet")]
    SchemaUnavailable(Identity),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("{}", self);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the protocol router over a read view of the registry
pub fn create_router(registry: Registry) -> Router {
    Router::new()
        .route("/partial/config", get(handlers::supergraph_config))
        .route(
            "/partial/schema/:namespace/:service",
            get(handlers::partial_schema),
        )
        .route(
            "/partial/service/:namespace/:service",
            get(handlers::backend_service),
        )
        .route(
            "/partial/secret/:graphvariant/:federation_version/composition-config-link",
            get(handlers::composition_config_link),
        )
        .route(
            "/secret/:graphid/storage-secret/:apikeyhash",
            get(handlers::storage_secret),
        )
        .layer(middleware::from_fn(log_requests))
        .with_state(registry)
}

async fn log_requests(req: Request, next: Next) -> Response {
    info!("{}: {}", req.method(), req.uri().path());
    next.run(req).await
}

pub struct ConfigServer {
    registry: Registry,
    addr: SocketAddr,
}

impl ConfigServer {
    pub fn new(registry: Registry, addr: SocketAddr) -> Self {
        Self { registry, addr }
    }

    pub async fn run(self) -> Result<()> {
        let app = create_router(self.registry);
        let listener = TcpListener::bind(self.addr).await?;

        info!("Config server listening on {}", self.addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| GraphfedError::ServerError(e.to_string()))
    }
}
