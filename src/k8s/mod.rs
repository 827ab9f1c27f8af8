pub mod client;
pub mod reconciler;
pub mod resolver;

pub use client::K8sClient;
pub use reconciler::Reconciler;
