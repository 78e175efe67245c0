use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_ALPHA: f32 = 0.4;
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Top-level config (wmbot.toml + WMBOT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WmbotConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub compositor: CompositorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    /// Bot API token from @BotFather.
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root under which per-chat watermark and request directories live.
    #[serde(default = "default_storage_root")]
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Bounded worker pool. `workers` caps how many request chains (and
/// therefore ffmpeg processes) run at the same time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositorConfig {
    /// ffmpeg binary name or absolute path.
    #[serde(default = "default_ffmpeg")]
    pub binary: String,
    /// Watermark opacity passed to `colorchannelmixer=aa=`.
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Kill ffmpeg after this many seconds. `None` waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            binary: default_ffmpeg(),
            alpha: DEFAULT_ALPHA,
            timeout_secs: None,
        }
    }
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}
fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}
fn default_ffmpeg() -> String {
    DEFAULT_FFMPEG.to_string()
}
fn default_storage_root() -> String {
    format!("{}/.wmbot/storage", home_dir())
}
fn default_db_path() -> String {
    format!("{}/.wmbot/wmbot.db", home_dir())
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}

impl WmbotConfig {
    /// Load config from a TOML file with WMBOT_* env var overrides.
    ///
    /// Nested keys use a double underscore: `WMBOT_TELEGRAM__BOT_TOKEN`,
    /// `WMBOT_POOL__WORKERS`. A missing file is not an error; defaults apply.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: WmbotConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("WMBOT_").split("__"))
            .extract()
            .map_err(|e| crate::error::WmbotError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bot cannot start with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::WmbotError;

        if self.telegram.bot_token.trim().is_empty() {
            return Err(WmbotError::Config(
                "telegram.bot_token is required".to_string(),
            ));
        }
        if self.pool.workers == 0 {
            return Err(WmbotError::Config(
                "pool.workers must be at least 1".to_string(),
            ));
        }
        if !(self.compositor.alpha > 0.0 && self.compositor.alpha <= 1.0) {
            return Err(WmbotError::Config(format!(
                "compositor.alpha must be in (0, 1], got {}",
                self.compositor.alpha
            )));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    format!("{}/.wmbot/wmbot.toml", home_dir())
}
