//! Configuration loading and management for slidesmith.
//!
//! Loads settings from `slidesmith.toml` with environment variable overrides for sensitive data.
//! Overrides come from the process environment first, then from a `.env` file in the
//! working directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE: &str = "slidesmith.toml";
const ENV_FILE: &str = ".env";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("failed to read environment file: {0}")]
    EnvFileError(#[from] dotenvy::Error),
    #[error("missing required API key for provider: {0}")]
    MissingApiKey(String),
    #[error("missing client id for the image search service")]
    MissingClientId,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier (e.g., "gemini-2.0-flash")
    pub model: String,
    /// System persona prepended to every conversation
    pub persona: String,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
    #[serde(default)]
    pub unsplash_client_id: Option<String>,
}

/// Image search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Base URL of the Unsplash API
    pub base_url: String,
    /// Requested photo orientation
    pub orientation: String,
    /// Timeout for each search and each image download
    pub timeout_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. "127.0.0.1:5000"
    pub addr: String,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the default location (slidesmith.toml in cwd or home).
    ///
    /// A missing file is not an error: defaults apply and the environment
    /// must supply the secrets.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::find_config_file() {
            Some(path) => Self::read(&path)?,
            None => Config::default(),
        };
        config.with_env(Path::new(ENV_FILE))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::read(path)?.with_env(Path::new(ENV_FILE))
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from the process environment and the env file at `env_file`.
    /// A variable already set in the process wins over the file.
    fn with_env(mut self, env_file: &Path) -> Result<Self, ConfigError> {
        let file_vars = read_env_file(env_file)?;
        self.apply_env(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file_vars.get(name).cloned())
        });
        Ok(self)
    }

    /// Override secrets and the model name
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.api.gemini_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.agent.model = model;
        }
        if let Some(id) = lookup("UNSPLASH_CLIENT_ID") {
            self.api.unsplash_client_id = Some(id);
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        dirs::home_dir()
            .map(|home| home.join(".config").join("slidesmith").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    /// Get the API key for the language model
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .gemini_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string()))
    }

    /// Get the client id for the image search service
    pub fn client_id(&self) -> Result<&str, ConfigError> {
        self.api
            .unsplash_client_id
            .as_deref()
            .ok_or(ConfigError::MissingClientId)
    }
}

/// Parse a dotenv-style file without touching the process environment.
/// A missing file yields no variables.
fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    match dotenvy::from_path_iter(path) {
        Ok(vars) => Ok(vars.collect::<Result<_, _>>()?),
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

impl ImagesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            persona: "You are an expert presentation designer. You write concise, factual slides."
                .to_string(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.unsplash.com".to_string(),
            orientation: "squarish".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
        }
    }
}
