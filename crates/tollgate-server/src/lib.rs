pub mod config;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ClientConfig, StorageBackend};
pub use observability::init_tracing;
pub use server::{ServerBuilder, TollgateServer, build_app};
