//! Protocol handlers and the DTOs they render

use super::{ApiError, ApiResult};
use crate::registry::{BackendConfig, Identity, Registry};
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct ServiceLocation {
    pub name: String,
    pub path: String,
}

/// Aggregate config listing the gateway polls first
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupergraphConfig {
    pub format_version: u32,
    pub id: String,
    pub schema_hash: String,
    pub implementing_service_locations: Vec<ServiceLocation>,
}

impl SupergraphConfig {
    fn from_snapshot(snapshot: &HashMap<Identity, BackendConfig>) -> Self {
        let mut locations: Vec<ServiceLocation> = snapshot
            .iter()
            .map(|(identity, config)| ServiceLocation {
                name: config.partial_name.clone(),
                path: format!("service/{}", identity),
            })
            .collect();
        locations.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            format_version: 1,
            id: "schema".to_string(),
            schema_hash: "schemaHash".to_string(),
            implementing_service_locations: locations,
        }
    }
}

/// Per-backend descriptor pointing the gateway at one service
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendService {
    pub url: String,
    pub partial_schema_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionConfigLink {
    pub config_path: String,
}

/// GET /partial/config
pub async fn supergraph_config(
    State(registry): State<Registry>,
) -> ApiResult<Json<SupergraphConfig>> {
    let snapshot = registry.snapshot().await;
    Ok(Json(SupergraphConfig::from_snapshot(&snapshot)))
}

/// GET /partial/schema/:namespace/:service
pub async fn partial_schema(
    State(registry): State<Registry>,
    Path((namespace, service)): Path<(String, String)>,
) -> ApiResult<String> {
    let identity = Identity::new(namespace, service);
    let entry = registry
        .get(&identity)
        .await
        .ok_or_else(|| ApiError::UnknownService(identity.clone()))?;

    // An upserted entry may still be waiting on its introspection fetch;
    // that must not be served as a fetched schema.
    entry.schema.ok_or(ApiError::SchemaUnavailable(identity))
}

/// GET /partial/service/:namespace/:service
pub async fn backend_service(
    State(registry): State<Registry>,
    Path((namespace, service)): Path<(String, String)>,
) -> ApiResult<Json<BackendService>> {
    let identity = Identity::new(namespace, service);
    let entry = registry
        .get(&identity)
        .await
        .ok_or_else(|| ApiError::UnknownService(identity.clone()))?;

    Ok(Json(BackendService {
        url: entry.endpoint_url(),
        partial_schema_path: format!("schema/{}", identity),
    }))
}

/// GET /partial/secret/:graphvariant/:federation_version/composition-config-link
pub async fn composition_config_link() -> Json<CompositionConfigLink> {
    Json(CompositionConfigLink {
        config_path: "config".to_string(),
    })
}

/// GET /secret/:graphid/storage-secret/:apikeyhash
pub async fn storage_secret() -> Json<&'static str> {
    Json("secret")
}
