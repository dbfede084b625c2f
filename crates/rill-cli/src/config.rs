//! Configuration file support

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Configuration for rill
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Streaming endpoint URL
    pub endpoint: Option<String>,
    /// Default stream mode ("ndjson" or "text")
    pub mode: Option<String>,
    /// Fixed conversation id to send with ndjson requests
    pub session_id: Option<String>,
    /// Extra headers sent with every request (auth tokens etc.)
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rill")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for RILL_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("RILL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        let dir = path.parent().unwrap();
        fs::create_dir_all(dir)?;

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            endpoint: Some("http://localhost:8000/api/chat/stream".to_string()),
            mode: Some("ndjson".to_string()),
            session_id: None,
            headers: HashMap::new(),
        };

        default_config.save()?;
        Ok(path)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# rill configuration file
# Place at ~/.config/rill/config.toml (Linux/Mac) or %APPDATA%\rill\config.toml (Windows)

# Full URL of the streaming chat endpoint
endpoint = "http://localhost:8000/api/chat/stream"

# Response framing (ndjson, text)
mode = "ndjson"

# Fixed conversation id for ndjson requests (optional)
# A fresh id is generated per run when unset
# session_id = "my-conversation"

# Extra headers sent with every request (optional)
[headers]
# Authorization = "Bearer ..."
"#
}
