//! Layered configuration for the server binary: defaults, merged with an
//! optional YAML file, merged with `TXN_`-prefixed environment variables.
//!
//! The four held-transaction knobs (spec §3) live alongside the two things
//! only the binary itself needs to boot: the listen address and the
//! database DSN.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use txn_core::Config as TxnConfig;
use txn_db::PoolOpts;

/// Effective configuration for `txn-server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub listen_addr: String,
    /// Database connection string (`postgres://...` or `sqlite:...`).
    pub database_dsn: String,
    /// Maximum pooled connections; sized to include headroom for
    /// `max_concurrent` held transactions (spec §5).
    pub pool_max_conns: u32,
    /// Minimum pooled connections kept warm.
    pub pool_min_conns: u32,
    pub max_concurrent: u32,
    pub default_timeout_secs: u32,
    pub max_timeout_secs: u32,
    pub reaper_interval_secs: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let txn_defaults = TxnConfig::default();
        Self {
            listen_addr: "127.0.0.1:8080".to_owned(),
            database_dsn: "sqlite::memory:".to_owned(),
            pool_max_conns: 10,
            pool_min_conns: 0,
            max_concurrent: txn_defaults.max_concurrent,
            default_timeout_secs: txn_defaults.default_timeout_secs,
            max_timeout_secs: txn_defaults.max_timeout_secs,
            reaper_interval_secs: txn_defaults.reaper_interval_secs,
        }
    }
}

impl ServerConfig {
    /// Layer defaults, an optional YAML file, and `TXN_`-prefixed
    /// environment variables, in that order of increasing precedence.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML file is present but
    /// malformed, or if the merged configuration does not deserialise into
    /// [`ServerConfig`].
    pub fn load(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed("TXN_")).extract()
    }

    #[must_use]
    pub fn txn_config(&self) -> TxnConfig {
        TxnConfig {
            max_concurrent: self.max_concurrent,
            default_timeout_secs: self.default_timeout_secs,
            max_timeout_secs: self.max_timeout_secs,
            reaper_interval_secs: self.reaper_interval_secs,
        }
    }

    #[must_use]
    pub fn pool_opts(&self) -> PoolOpts {
        PoolOpts {
            max_conns: self.pool_max_conns,
            min_conns: self.pool_min_conns,
            acquire_timeout: std::time::Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_txn_core_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_concurrent, 10);
        assert_eq!(cfg.default_timeout_secs, 30);
        assert_eq!(cfg.max_timeout_secs, 60);
        assert_eq!(cfg.reaper_interval_secs, 5);
    }

    #[test]
    fn loads_with_no_file_present() {
        let cfg = ServerConfig::load(None).expect("defaults alone must load");
        assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("txn-server.yaml");
        std::fs::write(&path, "max_concurrent: 25\nlisten_addr: \"0.0.0.0:9090\"\n")
            .expect("write config file");

        let cfg = ServerConfig::load(Some(&path)).expect("load with file");
        assert_eq!(cfg.max_concurrent, 25);
        assert_eq!(cfg.listen_addr, "0.0.0.0:9090");
        // Untouched fields keep their defaults.
        assert_eq!(cfg.default_timeout_secs, 30);
    }

    #[test]
    fn env_overrides_file_and_defaults() {
        // SAFETY-adjacent note: `std::env::set_var` is process-global; this
        // test runs single-threaded within the test binary's default
        // harness for this module, and clears the var afterwards.
        unsafe {
            std::env::set_var("TXN_MAX_CONCURRENT", "42");
        }
        let cfg = ServerConfig::load(None).expect("load with env override");
        unsafe {
            std::env::remove_var("TXN_MAX_CONCURRENT");
        }
        assert_eq!(cfg.max_concurrent, 42);
    }
}
