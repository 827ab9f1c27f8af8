//! Annotation-driven resolution of a Service into a backend config
//!
//! Pure metadata inspection, no I/O. The recognized annotations:
//!
//! - `schema.graphql.org/name`: schema group a partial schema belongs to
//! - `schema.graphql.org/partial`: partial schema name, default `{ns}/{name}`
//! - `schema.graphql.org/port`: name of the port to use, or a port number;
//!   default is the only declared port, or with multiple ports the one
//!   named "graphql"
//! - `schema.graphql.org/path`: GraphQL endpoint path, default `/graphql`
//! - `schema.graphql.org/protocol`: URL scheme, default `http`

use crate::registry::{BackendConfig, Identity};
use crate::{GraphfedError, Result};
use k8s_openapi::api::core::v1::Service;

pub const ANNOTATION_NAME: &str = "schema.graphql.org/name";
pub const ANNOTATION_PARTIAL: &str = "schema.graphql.org/partial";
pub const ANNOTATION_PORT: &str = "schema.graphql.org/port";
pub const ANNOTATION_PATH: &str = "schema.graphql.org/path";
pub const ANNOTATION_PROTOCOL: &str = "schema.graphql.org/protocol";

const DEFAULT_PORT_NAME: &str = "graphql";
const DEFAULT_PATH: &str = "/graphql";
const DEFAULT_PROTOCOL: &str = "http";

/// Namespace and name of a Service, or an error if either is unset
pub fn service_identity(service: &Service) -> Result<Identity> {
    let namespace = service
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| GraphfedError::KubernetesError("Service has no namespace".to_string()))?;
    let name = service
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| GraphfedError::KubernetesError("Service has no name".to_string()))?;
    Ok(Identity::new(namespace, name))
}

/// The value of the schema group annotation, if the Service carries one
pub fn schema_group(service: &Service) -> Option<&str> {
    service
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_NAME))
        .map(String::as_str)
}

fn annotation<'a>(service: &'a Service, key: &str) -> Option<&'a str> {
    service
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

/// Derive a backend config from Service metadata
///
/// The schema field of the returned config is always `None`; fetching it
/// is the caller's job.
pub fn resolve_backend(service: &Service) -> Result<BackendConfig> {
    let identity = service_identity(service)?;

    let partial_name = annotation(service, ANNOTATION_PARTIAL)
        .map(str::to_string)
        .unwrap_or_else(|| identity.to_string());

    let port = resolve_port(service, &identity)?;

    let path = annotation(service, ANNOTATION_PATH).unwrap_or(DEFAULT_PATH);
    let protocol = annotation(service, ANNOTATION_PROTOCOL).unwrap_or(DEFAULT_PROTOCOL);

    let endpoint = service
        .spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| GraphfedError::Resolution {
            namespace: identity.namespace.clone(),
            name: identity.name.clone(),
            reason: "no cluster IP".to_string(),
        })?;

    Ok(BackendConfig {
        partial_name,
        endpoint: endpoint.to_string(),
        port,
        path: path.to_string(),
        protocol: protocol.to_string(),
        schema: None,
    })
}

/// Port precedence: annotated port name, then single declared port, then
/// the port named "graphql", then the searched name parsed as a number
fn resolve_port(service: &Service, identity: &Identity) -> Result<i32> {
    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_deref())
        .unwrap_or(&[]);

    let port_name = match annotation(service, ANNOTATION_PORT) {
        Some(name) => name,
        None => {
            if let [only] = ports {
                return Ok(only.port);
            }
            DEFAULT_PORT_NAME
        }
    };

    if let Some(port) = ports
        .iter()
        .find(|p| p.name.as_deref() == Some(port_name))
    {
        return Ok(port.port);
    }

    if let Ok(number) = port_name.parse::<i32>() {
        return Ok(number);
    }

    Err(GraphfedError::PortResolution {
        namespace: identity.namespace.clone(),
        name: identity.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use std::collections::BTreeMap;

    fn make_service(annotations: &[(&str, &str)], ports: &[(&str, i32)]) -> Service {
        let mut service = Service::default();
        service.metadata.namespace = Some("shop".to_string());
        service.metadata.name = Some("products".to_string());
        service.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        service.spec = Some(ServiceSpec {
            cluster_ip: Some("10.0.0.5".to_string()),
            ports: Some(
                ports
                    .iter()
                    .map(|(name, port)| ServicePort {
                        name: Some(name.to_string()),
                        port: *port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        });
        service
    }

    #[test]
    fn test_defaults_and_graphql_port_name() {
        let service = make_service(
            &[("schema.graphql.org/name", "mesh")],
            &[("http", 80), ("graphql", 4000)],
        );

        let config = resolve_backend(&service).unwrap();
        assert_eq!(config.partial_name, "shop/products");
        assert_eq!(config.endpoint, "10.0.0.5");
        assert_eq!(config.port, 4000);
        assert_eq!(config.path, "/graphql");
        assert_eq!(config.protocol, "http");
        assert!(config.schema.is_none());
    }

    #[test]
    fn test_single_port_wins_regardless_of_name() {
        let service = make_service(&[], &[("web", 8080)]);
        assert_eq!(resolve_backend(&service).unwrap().port, 8080);
    }

    #[test]
    fn test_annotated_port_name() {
        let service = make_service(
            &[("schema.graphql.org/port", "admin")],
            &[("web", 80), ("admin", 9090)],
        );
        assert_eq!(resolve_backend(&service).unwrap().port, 9090);
    }

    #[test]
    fn test_numeric_port_fallback() {
        let service = make_service(
            &[("schema.graphql.org/port", "1234")],
            &[("web", 80), ("admin", 9090)],
        );
        assert_eq!(resolve_backend(&service).unwrap().port, 1234);
    }

    #[test]
    fn test_no_resolvable_port_fails() {
        let service = make_service(&[], &[]);
        let err = resolve_backend(&service).unwrap_err();
        assert!(matches!(err, GraphfedError::PortResolution { .. }));
    }

    #[test]
    fn test_multiple_ports_without_graphql_name_fails() {
        let service = make_service(&[], &[("web", 80), ("admin", 9090)]);
        let err = resolve_backend(&service).unwrap_err();
        assert!(matches!(err, GraphfedError::PortResolution { .. }));
    }

    #[test]
    fn test_annotation_overrides() {
        let service = make_service(
            &[
                ("schema.graphql.org/partial", "catalog"),
                ("schema.graphql.org/path", "/api/graphql"),
                ("schema.graphql.org/protocol", "https"),
            ],
            &[("graphql", 4000)],
        );

        let config = resolve_backend(&service).unwrap();
        assert_eq!(config.partial_name, "catalog");
        assert_eq!(config.path, "/api/graphql");
        assert_eq!(config.protocol, "https");
        assert_eq!(config.endpoint_url(), "https://10.0.0.5:4000/api/graphql");
    }

    #[test]
    fn test_missing_cluster_ip_fails() {
        let mut service = make_service(&[], &[("graphql", 4000)]);
        service.spec.as_mut().unwrap().cluster_ip = None;
        let err = resolve_backend(&service).unwrap_err();
        assert!(matches!(err, GraphfedError::Resolution { .. }));
    }
}
