use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spotx_common::config::GeneralConfig;
use spotx_common::rewards::{RewardRules, DISMISS_AFTER_SECS, VIEW_DURATION_SECS};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub rewards: RewardRules,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8080 }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join("spotx")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("spotx.db").to_string_lossy().to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the local key/value store (daily status, outbox)
    pub local_store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { local_store_dir: data_dir().join("local").to_string_lossy().to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewConfig {
    pub duration_secs: u32,
    pub dismiss_after_secs: u32,
    pub ad_load_timeout_secs: u64,
    /// Sessions left untouched this long outside the countdown are dropped
    pub idle_session_timeout_secs: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            duration_secs: VIEW_DURATION_SECS,
            dismiss_after_secs: DISMISS_AFTER_SECS,
            ad_load_timeout_secs: 3,
            idle_session_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://exp.host/--/api/v2/push/send".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Hex SHA-256 of the admin API token
    pub admin_token_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Reject a second completed view of the same slot on the same day
    pub enforce_single_view_per_slot: bool,
}

impl ServerConfig {
    /// Default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("spotx")
            .join("server.toml")
    }

    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        debug!("Loading server configuration from {:?}", config_path);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: ServerConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            info!("Loaded server configuration from {:?}", config_path);
            config
        } else {
            info!(
                "Configuration file not found at {:?}, creating default configuration",
                config_path
            );
            let config = Self::default();
            config.save_to_path(config_path)?;
            config
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            debug!("DATABASE_URL overrides database path");
            config.database.path =
                url.trim_start_matches("sqlite://").trim_start_matches("sqlite:").to_string();
        }

        if let Some(base) = config.general.data_dir.clone() {
            config.resolve_relative_paths(Path::new(&base));
        }

        Ok(config)
    }

    /// Anchor relative database and store paths under `general.data_dir`
    fn resolve_relative_paths(&mut self, base: &Path) {
        for path in [&mut self.database.path, &mut self.storage.local_store_dir] {
            if Path::new(path.as_str()).is_relative() {
                *path = base.join(path.as_str()).to_string_lossy().to_string();
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        debug!("Saving server configuration to {:?}", config_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Saved server configuration to {:?}", config_path);
        Ok(())
    }

    /// Validate the configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.view.duration_secs == 0 {
            anyhow::bail!("view.duration_secs must be positive");
        }
        if self.view.idle_session_timeout_secs <= u64::from(self.view.duration_secs) {
            anyhow::bail!("view.idle_session_timeout_secs must exceed the view duration");
        }
        if self.rewards.per_view_cents() <= 0 {
            anyhow::bail!("rewards.monthly_total_cents is too small to pay any reward per view");
        }

        if self.auth.admin_token_hash.is_none() {
            warn!("No admin token hash configured - admin routes will reject every request");
        }
        if self.view.dismiss_after_secs > self.view.duration_secs {
            warn!("view.dismiss_after_secs exceeds the view duration; dismiss appears at expiry");
        }
        if self.policy.enforce_single_view_per_slot {
            info!("Single view per slot per day is enforced");
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}
