pub mod cli;
pub mod error;
pub mod k8s;
pub mod registry;
pub mod schema;
pub mod server;

pub use error::{GraphfedError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
