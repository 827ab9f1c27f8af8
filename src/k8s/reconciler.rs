//! Per-service reconciliation driven by the cluster watch stream
//!
//! Each watch event for a Service runs one reconcile cycle: decide
//! membership by the schema group annotation, resolve the backend config,
//! fetch its SDL, and emit an update message. The registry is never
//! mutated directly from here; every mutation, including the conditional
//! refresh emitted by background fetch retries, is ordered through the
//! registry's single writer.

use crate::k8s::resolver;
use crate::registry::{BackendConfig, Identity, Registry, UpdateMessage};
use crate::schema::SchemaFetcher;
use crate::{GraphfedError, Result};
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::{self, Event};
use kube::Api;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct Reconciler {
    schema_name: String,
    fetcher: SchemaFetcher,
    registry: Registry,
    updates: UnboundedSender<UpdateMessage>,
    fetch_retries: u32,
}

impl Reconciler {
    pub fn new(
        schema_name: String,
        fetcher: SchemaFetcher,
        registry: Registry,
        updates: UnboundedSender<UpdateMessage>,
        fetch_retries: u32,
    ) -> Self {
        Self {
            schema_name,
            fetcher,
            registry,
            updates,
            fetch_retries,
        }
    }

    /// Watch Services and reconcile each change, reconnecting with backoff
    /// when the watch stream fails
    pub async fn run(&self, api: Api<Service>) -> Result<()> {
        info!(
            "Starting service watcher for schema group \"{}\"",
            self.schema_name
        );

        let mut backoff = Duration::from_secs(1);
        let max_backoff = Duration::from_secs(30);

        loop {
            match self.watch_services(&api).await {
                Ok(()) => {
                    warn!("Service watch stream ended, reconnecting...");
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    error!("Service watch failed: {}, reconnecting in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, max_backoff);
                }
            }
        }
    }

    async fn watch_services(&self, api: &Api<Service>) -> Result<()> {
        let config = watcher::Config::default();
        let mut stream = watcher::watcher(api.clone(), config).boxed();

        while let Some(event) = stream
            .try_next()
            .await
            .map_err(|e| GraphfedError::KubernetesError(e.to_string()))?
        {
            match event {
                Event::Apply(service) | Event::InitApply(service) => {
                    if let Err(e) = self.reconcile(&service).await {
                        // Retried when the watch stream resyncs
                        warn!("Reconcile failed: {}", e);
                    }
                }
                Event::Delete(service) => {
                    if let Err(e) = self.handle_deleted(&service).await {
                        warn!("Removal failed: {}", e);
                    }
                }
                Event::Init => {
                    debug!("Service watcher initialized");
                }
                Event::InitDone => {
                    info!(
                        "Initial sync complete, {} backends registered",
                        self.registry.len().await
                    );
                }
            }
        }

        Ok(())
    }

    /// One reconcile cycle for a present Service
    pub async fn reconcile(&self, service: &Service) -> Result<()> {
        let identity = resolver::service_identity(service)?;

        match resolver::schema_group(service) {
            Some(group) if group == self.schema_name => {
                self.reconcile_member(identity, service).await
            }
            _ => self.remove(identity),
        }
    }

    /// A deleted Service is treated like a membership mismatch: its entry
    /// is dropped instead of being served stale indefinitely
    pub async fn handle_deleted(&self, service: &Service) -> Result<()> {
        let identity = resolver::service_identity(service)?;
        self.remove(identity)
    }

    async fn reconcile_member(&self, identity: Identity, service: &Service) -> Result<()> {
        let mut config = resolver::resolve_backend(service)?;
        info!("{}: {}", config.partial_name, config.endpoint_url());

        match self.fetcher.fetch_sdl(&config).await {
            Ok(sdl) => config.schema = Some(sdl),
            Err(e) => {
                // The resolved endpoint metadata is still worth serving;
                // the schema is fetched again in the background.
                warn!("{}: {}", identity, e);
                self.spawn_fetch_retry(identity.clone(), config.clone());
            }
        }

        self.send(UpdateMessage::Upsert(identity, config))
    }

    /// Removals are emitted unconditionally; applying a removal for an
    /// absent entry is a no-op, and checking the registry here would race
    /// with updates still queued for the single writer.
    fn remove(&self, identity: Identity) -> Result<()> {
        self.send(UpdateMessage::Remove(identity))
    }

    fn send(&self, msg: UpdateMessage) -> Result<()> {
        self.updates
            .send(msg)
            .map_err(|_| GraphfedError::ServerError("registry update channel closed".to_string()))
    }

    fn spawn_fetch_retry(&self, identity: Identity, config: BackendConfig) {
        if self.fetch_retries == 0 {
            return;
        }

        let fetcher = self.fetcher.clone();
        let updates = self.updates.clone();
        let retries = self.fetch_retries;

        tokio::spawn(async move {
            let mut delay = Duration::from_secs(2);

            for attempt in 1..=retries {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));

                match fetcher.fetch_sdl(&config).await {
                    Ok(sdl) => {
                        // Refresh is conditional inside the registry: the
                        // schema only lands if the entry still carries this
                        // cycle's resolution, so a removal or a newer cycle
                        // queued ahead of it wins.
                        let mut refreshed = config.clone();
                        refreshed.schema = Some(sdl);
                        if updates
                            .send(UpdateMessage::Refresh(identity.clone(), refreshed))
                            .is_err()
                        {
                            warn!("{}: update channel closed, dropping schema", identity);
                        }
                        return;
                    }
                    Err(e) => {
                        warn!("{}: fetch retry {}/{} failed: {}", identity, attempt, retries, e);
                    }
                }
            }
        });
    }
}
