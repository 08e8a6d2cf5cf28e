use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default = "default_access_token_expire")]
    pub access_token_expire_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_blob_path")]
    pub blob_path: String,
    /// Lifetime of signed blob URLs, in seconds
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

/// Points economy parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PointsConfig {
    /// Flat reward credited to the author on every upload
    #[serde(default = "default_upload_reward")]
    pub upload_reward: i64,
    /// Author's share of each sale, in percent
    #[serde(default = "default_commission_rate")]
    pub commission_rate_percent: i64,
    /// Lowest price a file may be listed at
    #[serde(default = "default_min_price")]
    pub min_price: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatermarkConfig {
    #[serde(default = "default_watermark_text")]
    pub text: String,
    /// TrueType font for the watermark stamp; falls back to common
    /// system font locations when unset
    #[serde(default)]
    pub font_path: Option<String>,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1420
}

fn default_db_path() -> String {
    "data/one4lib.db".to_string()
}

fn default_jwt_secret() -> String {
    "your-super-secret-key-change-it".to_string()
}

fn default_access_token_expire() -> u64 {
    1440 // 24 hours
}

fn default_blob_path() -> String {
    "data/blobs".to_string()
}

fn default_signed_url_ttl() -> u64 {
    3600
}

fn default_upload_reward() -> i64 {
    1
}

fn default_commission_rate() -> i64 {
    10
}

fn default_min_price() -> i64 {
    4
}

fn default_watermark_text() -> String {
    "© One4Lib".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            access_token_expire_minutes: default_access_token_expire(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_path: default_blob_path(),
            signed_url_ttl_secs: default_signed_url_ttl(),
        }
    }
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            upload_reward: default_upload_reward(),
            commission_rate_percent: default_commission_rate(),
            min_price: default_min_price(),
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: default_watermark_text(),
            font_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            storage: StorageConfig::default(),
            points: PointsConfig::default(),
            watermark: WatermarkConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        Ok(config)
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Ensure JWT secret is secure and persisted
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret == default_jwt_secret() || self.jwt.secret.is_empty() {
            let secret_path = Path::new("data/.jwt_secret");

            if secret_path.exists() {
                let secret = fs::read_to_string(secret_path)?;
                self.jwt.secret = secret.trim().to_string();
                tracing::info!("Loaded persisted JWT secret from data/.jwt_secret");
            } else {
                let secret = uuid::Uuid::new_v4().to_string();

                if let Some(parent) = secret_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                fs::write(secret_path, &secret)?;
                self.jwt.secret = secret;
                tracing::info!("Generated and persisted new JWT secret to data/.jwt_secret");
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Format: O4L_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("O4L_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("O4L_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        if let Ok(val) = env::var("O4L_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Ok(val) = env::var("O4L_CONF_JWT_SECRET") {
            self.jwt.secret = val;
        }
        if let Ok(val) = env::var("O4L_CONF_JWT_ACCESS_EXPIRE") {
            if let Ok(minutes) = val.parse() {
                self.jwt.access_token_expire_minutes = minutes;
            }
        }

        if let Ok(val) = env::var("O4L_CONF_STORAGE_BLOB_PATH") {
            self.storage.blob_path = val;
        }
        if let Ok(val) = env::var("O4L_CONF_STORAGE_SIGNED_URL_TTL") {
            if let Ok(secs) = val.parse() {
                self.storage.signed_url_ttl_secs = secs;
            }
        }

        if let Ok(val) = env::var("O4L_CONF_POINTS_UPLOAD_REWARD") {
            if let Ok(v) = val.parse() {
                self.points.upload_reward = v;
            }
        }
        if let Ok(val) = env::var("O4L_CONF_POINTS_COMMISSION_RATE") {
            if let Ok(v) = val.parse() {
                self.points.commission_rate_percent = v;
            }
        }
        if let Ok(val) = env::var("O4L_CONF_POINTS_MIN_PRICE") {
            if let Ok(v) = val.parse() {
                self.points.min_price = v;
            }
        }

        if let Ok(val) = env::var("O4L_CONF_WATERMARK_TEXT") {
            if !val.trim().is_empty() {
                self.watermark.text = val;
            }
        }
        if let Ok(val) = env::var("O4L_CONF_WATERMARK_FONT_PATH") {
            if !val.trim().is_empty() {
                self.watermark.font_path = Some(val);
            }
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::create_dir_all(&self.storage.blob_path)?;

        Ok(())
    }
}
