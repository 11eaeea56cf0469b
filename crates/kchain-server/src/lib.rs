//! HTTP server for the kchain ledger.
//!
//! Exposes asset, address and transaction lookups, paginated history and
//! transaction injection over a JSON API.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::{FileEngine, KchainServer};
