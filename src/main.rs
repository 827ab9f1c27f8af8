use clap::Parser;
use graphfed::cli::Cli;
use graphfed::k8s::{K8sClient, Reconciler};
use graphfed::registry::{self, Registry};
use graphfed::schema::SchemaFetcher;
use graphfed::server::ConfigServer;
use graphfed::{GraphfedError, Result};
use std::process;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting graphfed v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let registry = Registry::new();
    let (updates, update_rx) = mpsc::unbounded_channel();

    // The registry's single writer
    tokio::spawn(registry::listen(registry.clone(), update_rx));

    let server = ConfigServer::new(registry.clone(), cli.listen_addr);
    let server_task = tokio::spawn(server.run());

    let client = K8sClient::try_default().await?;
    let services = match cli.namespace.as_deref() {
        Some(ns) => client.services(ns),
        None => client.services_all(),
    };

    let fetcher = SchemaFetcher::new(Duration::from_secs(cli.fetch_timeout_secs))?;
    let reconciler = Reconciler::new(
        cli.schema_name,
        fetcher,
        registry,
        updates,
        cli.fetch_retries,
    );

    tokio::select! {
        result = reconciler.run(services) => result,
        result = server_task => match result {
            Ok(result) => result,
            Err(e) => Err(GraphfedError::ServerError(format!(
                "Config server task failed: {}",
                e
            ))),
        },
    }
}
