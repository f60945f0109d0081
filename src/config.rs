//! Runtime configuration for part-relay.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Every section is optional in the file; missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "part-relay", about = "Streaming relay of partial model results")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address. Overrides `server.listen` from the file.
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub models: ModelsConfig,
    pub search: SearchConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Maximum concurrent requests.
    pub max_concurrent_requests: usize,

    /// Request timeout in seconds, up to the response headers. Streamed
    /// bodies are bounded by `relay.session_timeout_secs` instead.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            max_concurrent_requests: 64,
            request_timeout_secs: 30,
        }
    }
}

/// Relay session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Parts buffered between a session and its transport.
    pub buffer_size: usize,

    /// Interval between SSE keep-alive comments.
    pub keep_alive_secs: u64,

    /// Upper bound on a whole session, producers included.
    pub session_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            keep_alive_secs: 15,
            session_timeout_secs: 300,
        }
    }
}

/// Model tiers. Both are served by the in-process scripted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub basic_model: String,
    pub advanced_model: String,

    /// Characters per streamed delta.
    pub chunk_chars: usize,

    /// Delay before each delta, in milliseconds (0 = none).
    pub chunk_delay_ms: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            basic_model: "flash-lite".to_string(),
            advanced_model: "flash".to_string(),
            chunk_chars: 8,
            chunk_delay_ms: 20,
        }
    }
}

impl ModelsConfig {
    pub fn chunk_delay(&self) -> Option<Duration> {
        (self.chunk_delay_ms > 0).then(|| Duration::from_millis(self.chunk_delay_ms))
    }
}

/// Search provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hits requested per query.
    pub max_results: usize,

    /// Simulated latency per query, in milliseconds.
    pub result_delay_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            result_delay_ms: 50,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file is missing.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.max_concurrent_requests == 0 {
            bail!("server.max_concurrent_requests must be at least 1");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be at least 1");
        }
        if self.relay.buffer_size == 0 {
            bail!("relay.buffer_size must be at least 1");
        }
        if self.relay.keep_alive_secs == 0 {
            bail!("relay.keep_alive_secs must be at least 1");
        }
        if self.relay.session_timeout_secs == 0 {
            bail!("relay.session_timeout_secs must be at least 1");
        }
        if self.models.chunk_chars == 0 {
            bail!("models.chunk_chars must be at least 1");
        }
        if self.search.max_results == 0 {
            bail!("search.max_results must be at least 1");
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.relay.buffer_size, 64);
        assert_eq!(cfg.models.chunk_delay(), Some(Duration::from_millis(20)));
        cfg.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "relay": {{ "buffer_size": 4 }}, "models": {{ "chunk_delay_ms": 0 }} }}"#).unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.relay.buffer_size, 4);
        assert_eq!(cfg.relay.keep_alive_secs, 15);
        assert_eq!(cfg.models.chunk_delay(), None);
        assert_eq!(cfg.server, ServerConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let mut cfg = Config::default();
        cfg.relay.buffer_size = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_size"));
    }

    #[test]
    fn test_cli_listen_overrides_file() {
        let cli = Cli::parse_from(["part-relay", "--listen", "127.0.0.1:9000"]);
        let mut cfg = Config::default();
        cfg.apply_cli(&cli);
        assert_eq!(cfg.server.listen, "127.0.0.1:9000");
        assert!(!cli.log_json);
    }
}
