//! Command-line and environment configuration.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use acp::{AgentId, CLOCK_SKEW_SECS, InMemoryKeyRegistry, VerifyingKey};
use clap::Parser;

use crate::error::ServerError;

/// Verifier service settings.
///
/// Every flag can also be supplied through its environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "acp-server")]
#[command(about = "ACP reference verifier: challenge, proof-of-possession and token checks", long_about = None)]
pub struct Config {
    /// Institution public key, base64url of 32 bytes
    #[arg(long, env = "ACP_INSTITUTION_PUBLIC_KEY")]
    pub institution_public_key: String,

    /// Listen address
    #[arg(long, env = "ACP_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// JSON file mapping AgentID to base64url public key
    #[arg(long, env = "ACP_REGISTRY_FILE")]
    pub registry_file: Option<PathBuf>,

    /// Seconds between challenge and nonce store sweeps
    #[arg(long, env = "ACP_PRUNE_INTERVAL_SECS", default_value_t = 60)]
    pub prune_interval_secs: u64,

    /// Tolerated clock drift on `iat`, in seconds
    #[arg(long, env = "ACP_CLOCK_SKEW_SECS", default_value_t = CLOCK_SKEW_SECS)]
    pub clock_skew_secs: i64,
}

impl Config {
    /// Decodes the institution key.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the value is not a valid 32-byte base64url key.
    pub fn institution_key(&self) -> Result<VerifyingKey, ServerError> {
        VerifyingKey::from_base64url(self.institution_public_key.trim()).map_err(|e| {
            ServerError::Config {
                reason: format!("ACP_INSTITUTION_PUBLIC_KEY: {e}"),
            }
        })
    }

    /// Interval between prune sweeps. Never zero.
    #[must_use]
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }

    /// Builds the agent key registry, empty when no file is configured.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Config` if its content
    /// is malformed.
    pub fn load_registry(&self) -> Result<InMemoryKeyRegistry, ServerError> {
        match &self.registry_file {
            Some(path) => load_registry_file(path),
            None => Ok(InMemoryKeyRegistry::new()),
        }
    }
}

/// Reads a registry file of the form `{"<AgentID>": "<base64url key>", ...}`.
///
/// # Errors
///
/// Returns `Io` on read failure, and `Config` if the JSON is malformed, a
/// key does not decode, or an entry's AgentID is not the one its key
/// derives.
pub fn load_registry_file(path: &Path) -> Result<InMemoryKeyRegistry, ServerError> {
    let raw = std::fs::read_to_string(path)?;
    parse_registry(&raw)
}

/// Parses registry JSON. See [`load_registry_file`].
///
/// # Errors
///
/// Returns `Config` on any malformed entry.
pub fn parse_registry(raw: &str) -> Result<InMemoryKeyRegistry, ServerError> {
    let entries: HashMap<String, String> =
        serde_json::from_str(raw).map_err(|e| ServerError::Config {
            reason: format!("registry file: {e}"),
        })?;

    let registry = InMemoryKeyRegistry::new();
    for (listed, encoded) in entries {
        let listed = AgentId::parse(&listed).map_err(|e| ServerError::Config {
            reason: format!("registry entry {listed}: {e}"),
        })?;
        let key = VerifyingKey::from_base64url(&encoded).map_err(|e| ServerError::Config {
            reason: format!("registry entry {listed}: {e}"),
        })?;
        let derived = registry.register(key);
        if derived != listed {
            return Err(ServerError::Config {
                reason: format!("registry entry {listed} holds the key of {derived}"),
            });
        }
    }
    tracing::info!(agents = registry.len(), "agent registry loaded");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use acp::AgentIdentity;

    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("acp-server").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let key = AgentIdentity::generate().verifying_key().to_base64url();
        let config = parse(&["--institution-public-key", &key]);

        assert_eq!(config.addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.prune_interval(), Duration::from_secs(60));
        assert_eq!(config.clock_skew_secs, 300);
        assert!(config.registry_file.is_none());
        assert!(config.institution_key().is_ok());
    }

    #[test]
    fn zero_prune_interval_is_raised() {
        let config = parse(&["--institution-public-key", "x", "--prune-interval-secs", "0"]);
        assert_eq!(config.prune_interval(), Duration::from_secs(1));
    }

    #[test]
    fn bad_institution_key_is_config_error() {
        let config = parse(&["--institution-public-key", "too-short"]);
        assert!(matches!(config.institution_key(), Err(ServerError::Config { .. })));
    }

    #[test]
    fn registry_entries_are_checked_against_their_keys() {
        let a = AgentIdentity::generate();
        let b = AgentIdentity::generate();

        let good = format!(
            r#"{{"{}": "{}"}}"#,
            a.agent_id(),
            a.verifying_key().to_base64url()
        );
        assert_eq!(parse_registry(&good).unwrap().len(), 1);

        let swapped = format!(
            r#"{{"{}": "{}"}}"#,
            a.agent_id(),
            b.verifying_key().to_base64url()
        );
        assert!(matches!(parse_registry(&swapped), Err(ServerError::Config { .. })));
    }

    #[test]
    fn registry_rejects_non_object() {
        assert!(parse_registry("[]").is_err());
    }
}
