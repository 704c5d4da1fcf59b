use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Explicit push-channel URL. Derived from baseUrl when unset.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// WebSocket endpoint for the push channel (`/ws` on the backend).
    pub fn ws_endpoint(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", base)
        };
        format!("{}/ws", base)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingConfig {
    /// Screenshot streaming rate requested from the backend.
    #[serde(default = "default_fps")]
    pub fps: u8,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

fn default_fps() -> u8 {
    5
}

fn default_keepalive_secs() -> u64 {
    30
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.server.base_url, "http://localhost:8000");
        assert_eq!(cfg.streaming.fps, 5);
        assert_eq!(cfg.streaming.keepalive_secs, 30);
    }

    #[test]
    fn test_ws_endpoint_derived_from_base_url() {
        let cfg = Config::default();
        assert_eq!(cfg.server.ws_endpoint(), "ws://localhost:8000/ws");

        let secure = ServerConfig {
            base_url: "https://pilot.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(secure.ws_endpoint(), "wss://pilot.example.com/ws");
    }

    #[test]
    fn test_ws_endpoint_override() {
        let cfg = ServerConfig {
            ws_url: Some("ws://10.0.0.2:9000/stream".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.ws_endpoint(), "ws://10.0.0.2:9000/stream");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = Config::default();
        cfg.streaming.fps = 12;
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.streaming.fps, 12);
    }
}
