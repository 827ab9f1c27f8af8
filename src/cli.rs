use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "graphfed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publishes annotated GraphQL backends over the managed federation config protocol", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        help = "Schema group name; only Services annotated with this name are served"
    )]
    pub schema_name: String,

    #[arg(
        long,
        default_value = "0.0.0.0:8000",
        help = "Address the config server listens on"
    )]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        default_value_t = 10,
        help = "Timeout in seconds for introspection fetches"
    )]
    pub fetch_timeout_secs: u64,

    #[arg(
        long,
        default_value_t = 3,
        help = "Background retry attempts after a failed introspection fetch"
    )]
    pub fetch_retries: u32,

    #[arg(
        short,
        long,
        help = "Watch a single namespace instead of the whole cluster"
    )]
    pub namespace: Option<String>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}
