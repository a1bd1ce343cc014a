use crate::error::ConfigError;
use std::env;
use std::time::Duration;

/// Bootstrap configuration for a node.
///
/// Constructible either from explicit values (used directly by tests and by
/// `Node::new`) or from the environment via [`NodeConfig::from_env`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub view: String,
    pub repl_factor: usize,
    pub address: String,
    pub gossip_interval: Duration,
    pub request_timeout: Duration,
}

const DEFAULT_GOSSIP_INTERVAL_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 500;
pub const LISTEN_PORT: u16 = 13800;

impl NodeConfig {
    pub fn new(view: impl Into<String>, repl_factor: usize, address: impl Into<String>) -> Self {
        NodeConfig {
            view: view.into(),
            repl_factor,
            address: address.into(),
            gossip_interval: Duration::from_millis(DEFAULT_GOSSIP_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn with_gossip_interval(mut self, d: Duration) -> Self {
        self.gossip_interval = d;
        self
    }

    pub fn with_request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }

    /// Reads `VIEW`, `REPL_FACTOR`, `ADDRESS` and the optional tuning
    /// variables `GOSSIP_INTERVAL_MS`/`REQUEST_TIMEOUT_MS` from the process
    /// environment. Never called from tests — tests build a `NodeConfig`
    /// directly so they never depend on ambient state.
    pub fn from_env() -> Result<Self, ConfigError> {
        let view = env::var("VIEW").map_err(|_| ConfigError::MissingVar("VIEW"))?;
        let repl_factor_raw =
            env::var("REPL_FACTOR").map_err(|_| ConfigError::MissingVar("REPL_FACTOR"))?;
        let repl_factor = repl_factor_raw
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidVar("REPL_FACTOR", repl_factor_raw))?;
        let address = env::var("ADDRESS").map_err(|_| ConfigError::MissingVar("ADDRESS"))?;

        let mut config = NodeConfig::new(view, repl_factor, address);

        if let Ok(raw) = env::var("GOSSIP_INTERVAL_MS") {
            let ms = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidVar("GOSSIP_INTERVAL_MS", raw))?;
            config.gossip_interval = Duration::from_millis(ms);
        }
        if let Ok(raw) = env::var("REQUEST_TIMEOUT_MS") {
            let ms = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidVar("REQUEST_TIMEOUT_MS", raw))?;
            config.request_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_has_defaults() {
        let cfg = NodeConfig::new("a,b", 1, "a");
        assert_eq!(cfg.gossip_interval, Duration::from_millis(1000));
        assert_eq!(cfg.request_timeout, Duration::from_millis(500));
    }

    #[test]
    fn builder_overrides_tuning() {
        let cfg = NodeConfig::new("a,b", 1, "a").with_gossip_interval(Duration::from_millis(50));
        assert_eq!(cfg.gossip_interval, Duration::from_millis(50));
    }
}
