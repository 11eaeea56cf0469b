use std::sync::Arc;

use kchain_ledger::{CommitHook, LedgerConfig, LedgerEngine, LoggingHook, MemoryProjection};
use kchain_store::FileChainLog;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Ledger engine backed by the file chain log.
pub type FileEngine = LedgerEngine<FileChainLog, MemoryProjection>;

/// kchain HTTP server.
pub struct KchainServer {
    config: ServerConfig,
}

impl KchainServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the chain log under `data_dir` and replay it into a fresh engine.
    pub fn open_engine(&self, hook: Arc<dyn CommitHook>) -> ServerResult<Arc<FileEngine>> {
        let issuer = self.config.issuer()?;
        let chain = FileChainLog::open(&self.config.chain_path(), self.config.sync_mode)?;
        let engine = LedgerEngine::open(LedgerConfig::new(issuer), chain, MemoryProjection::new(), hook)?;
        Ok(Arc::new(engine))
    }

    /// Build the router for an engine (useful for testing).
    pub fn router(&self, engine: Arc<FileEngine>) -> axum::Router {
        build_router(engine, self.config.max_per_page)
    }

    /// Serve requests until ctrl-c, then close the ledger.
    pub async fn serve(self) -> ServerResult<()> {
        let engine = self.open_engine(Arc::new(LoggingHook))?;
        let app = self.router(Arc::clone(&engine));

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            transactions = engine.len()?,
            "kchain server listening"
        );

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        engine.close().await;
        served
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use kchain_crypto::SigningKey;
    use kchain_ledger::{NoOpHook, Output, Transaction};
    use kchain_types::AssetId;

    use super::*;

    fn config(dir: &std::path::Path, issuer: &SigningKey) -> ServerConfig {
        ServerConfig {
            data_dir: dir.to_path_buf(),
            issuer_public_key: Some(issuer.verifying_key().to_hex()),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn server_construction() {
        let server = KchainServer::new(ServerConfig::default());
        assert_eq!(server.config().max_per_page, 100);
    }

    #[tokio::test]
    async fn open_engine_requires_issuer() {
        let dir = tempfile::tempdir().unwrap();
        let server = KchainServer::new(ServerConfig {
            data_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        });
        assert!(matches!(
            server.open_engine(Arc::new(NoOpHook)),
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn engine_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = SigningKey::from_bytes([6; 32]);
        let server = KchainServer::new(config(dir.path(), &issuer));

        let engine = server.open_engine(Arc::new(NoOpHook)).unwrap();
        let tx = engine
            .inject(Transaction::creation(
                AssetId::new(1),
                Output::new(issuer.address()),
                &issuer,
            ))
            .unwrap();
        engine.close().await;
        drop(engine);

        let engine = server.open_engine(Arc::new(NoOpHook)).unwrap();
        assert_eq!(engine.head().unwrap(), Some(tx));
        engine.close().await;
    }
}
