use crate::{GraphfedError, Result};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use tracing::{debug, info};

pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    pub async fn try_default() -> Result<Self> {
        debug!("Initializing Kubernetes client");

        let client = Client::try_default().await.map_err(|e| {
            GraphfedError::KubernetesError(format!("Failed to create K8s client: {}", e))
        })?;

        info!("Successfully connected to Kubernetes cluster");

        Ok(Self { client })
    }

    pub fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    pub fn services_all(&self) -> Api<Service> {
        Api::all(self.client.clone())
    }
}
