use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub bots: Vec<BotConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Recently seen message ids remembered per bot. 0 disables de-duplication.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub name: String,
    pub webhook_url: String,
    /// Callback route for this bot.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_timeout_secs() -> u64 {
    wxbot::delivery::DEFAULT_TIMEOUT.as_secs()
}

fn default_dedup_capacity() -> usize {
    wxbot::dedup::DEFAULT_CAPACITY
}

fn default_path() -> String {
    "/".to_string()
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bots.is_empty() {
            bail!("At least one [[bots]] entry is required");
        }

        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        for bot in &self.bots {
            if bot.name.trim().is_empty() {
                bail!("Bot name must not be empty");
            }
            if !names.insert(bot.name.as_str()) {
                bail!("Bot '{}' is configured more than once", bot.name);
            }
            if !bot.path.starts_with('/') {
                bail!("Bot '{}' path must start with '/': {}", bot.name, bot.path);
            }
            if !paths.insert(bot.path.as_str()) {
                bail!("Bot '{}' reuses callback path {}", bot.name, bot.path);
            }
        }

        Ok(())
    }
}
