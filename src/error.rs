use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphfedError {
    #[error("Kubernetes error: {0}")]
    KubernetesError(String),

    #[error("No port could be resolved for service {namespace}/{name}")]
    PortResolution { namespace: String, name: String },

    #[error("Service {namespace}/{name} cannot be resolved: {reason}")]
    Resolution {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("Schema fetch from {url} failed: {reason}")]
    SchemaFetch { url: String, reason: String },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphfedError>;
