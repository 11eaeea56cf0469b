use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use kchain_crypto::VerifyingKey;
use kchain_store::SyncMode;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// File name of the chain log inside `data_dir`.
pub const CHAIN_LOG_FILE: &str = "chain.log";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Hex-encoded Ed25519 key of the asset issuer. Required to serve.
    pub issuer_public_key: Option<String>,
    pub sync_mode: SyncMode,
    /// Upper bound applied to `per_page` on `/txs`.
    pub max_per_page: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            data_dir: PathBuf::from("data"),
            issuer_public_key: None,
            sync_mode: SyncMode::default(),
            max_per_page: 100,
        }
    }
}

impl ServerConfig {
    /// Load a TOML configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        if config.max_per_page == 0 {
            return Err(ServerError::Config("max_per_page must be greater than zero".into()));
        }
        Ok(config)
    }

    /// The configured issuer key.
    pub fn issuer(&self) -> ServerResult<VerifyingKey> {
        let hex = self
            .issuer_public_key
            .as_deref()
            .ok_or_else(|| ServerError::Config("issuer_public_key is not set".into()))?;
        VerifyingKey::from_hex(hex.trim())
            .map_err(|e| ServerError::Config(format!("issuer_public_key: {e}")))
    }

    pub fn chain_path(&self) -> PathBuf {
        self.data_dir.join(CHAIN_LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use kchain_crypto::SigningKey;

    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.sync_mode, SyncMode::EveryWrite);
        assert_eq!(c.max_per_page, 100);
        assert_eq!(c.chain_path(), PathBuf::from("data").join("chain.log"));
        assert!(c.issuer_public_key.is_none());
    }

    #[test]
    fn parses_toml_with_defaults() {
        let issuer = SigningKey::from_bytes([4; 32]).verifying_key();
        let text = format!(
            r#"
            bind_addr = "0.0.0.0:9000"
            issuer_public_key = "{}"
            sync_mode = "os_default"
            "#,
            issuer.to_hex()
        );
        let c = ServerConfig::from_toml(&text).unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(c.max_per_page, 100);
        assert_eq!(c.issuer().unwrap(), issuer);
    }

    #[test]
    fn missing_issuer_is_a_config_error() {
        let c = ServerConfig::default();
        assert!(matches!(c.issuer(), Err(ServerError::Config(_))));

        let c = ServerConfig {
            issuer_public_key: Some("not-hex".into()),
            ..ServerConfig::default()
        };
        assert!(matches!(c.issuer(), Err(ServerError::Config(_))));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ServerConfig::from_toml("max_per_page = 0").is_err());
        assert!(ServerConfig::from_toml("sync_mode = \"sometimes\"").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kchain.toml");
        fs::write(&path, "data_dir = \"/var/lib/kchain\"\n").unwrap();
        let c = ServerConfig::load(&path).unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/kchain"));

        assert!(ServerConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
