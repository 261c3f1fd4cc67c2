use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::{Role, SeedAccount};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// How long a login session stays valid (default: 7 days)
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure` (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookie: bool,
}

impl AuthConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            secure_cookie: false,
        }
    }
}

fn default_session_ttl_hours() -> i64 {
    24 * 7
}

/// Longest accepted session lifetime: ten years
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded product images are written to
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Largest accepted image upload in bytes (default: 5 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Accepted image file extensions, lowercase
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Reject product creation without an image
    #[serde(default = "default_require_image")]
    pub require_image: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
            require_image: default_require_image(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_require_image() -> bool {
    true
}

/// Which products a farmer sees on their dashboard
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FarmerScope {
    /// Only products the farmer owns
    #[default]
    Owned,
    /// The whole catalog
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub farmer_scope: FarmerScope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Seed the account roster when the server starts
    #[serde(default = "default_seed_on_startup")]
    pub on_startup: bool,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_farmer_password")]
    pub farmer_password: String,
    /// Farmers are named `farmer1` through `farmer{farmer_count}`
    #[serde(default = "default_farmer_count")]
    pub farmer_count: u32,
}

impl SeedConfig {
    /// The accounts the seeder ensures exist
    pub fn roster(&self) -> Vec<SeedAccount> {
        let mut accounts = vec![SeedAccount::new(
            &self.admin_username,
            &self.admin_password,
            Role::Admin,
        )];
        for i in 1..=self.farmer_count {
            accounts.push(SeedAccount::new(
                format!("farmer{}", i),
                &self.farmer_password,
                Role::Farmer,
            ));
        }
        accounts
    }

    pub fn uses_default_passwords(&self) -> bool {
        self.admin_password == default_admin_password()
            || self.farmer_password == default_farmer_password()
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            on_startup: default_seed_on_startup(),
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            farmer_password: default_farmer_password(),
            farmer_count: default_farmer_count(),
        }
    }
}

fn default_seed_on_startup() -> bool {
    true
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

fn default_farmer_password() -> String {
    "farmer123".to_string()
}

fn default_farmer_count() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let ttl = self.auth.session_ttl_hours;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&ttl) {
            bail!(
                "auth.session_ttl_hours must be between 1 and {} (got {})",
                MAX_SESSION_TTL_HOURS,
                ttl
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.session_ttl(), chrono::Duration::hours(168));
        assert_eq!(config.catalog.farmer_scope, FarmerScope::Owned);
        assert!(config.storage.require_image);
        assert!(config.storage.allowed_extensions.contains(&"png".to_string()));
        assert!(config.seed.on_startup);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [server]
            port = 8081

            [catalog]
            farmer_scope = "all"

            [storage]
            require_image = false
            max_upload_bytes = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.catalog.farmer_scope, FarmerScope::All);
        assert!(!config.storage.require_image);
        assert_eq!(config.storage.max_upload_bytes, 1024);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_scope_is_an_error() {
        assert!(Config::parse("[catalog]\nfarmer_scope = \"everyone\"\n").is_err());
    }

    #[test]
    fn test_session_ttl_is_bounded() {
        assert!(Config::parse("[auth]\nsession_ttl_hours = 0\n").is_err());
        assert!(Config::parse("[auth]\nsession_ttl_hours = -5\n").is_err());
        assert!(Config::parse("[auth]\nsession_ttl_hours = 9223372036854775807\n").is_err());

        let config = Config::parse("[auth]\nsession_ttl_hours = 87600\n").unwrap();
        assert_eq!(config.auth.session_ttl(), chrono::Duration::hours(87600));
    }

    #[test]
    fn test_custom_passwords_are_not_demo_passwords() {
        let config = Config::parse(
            "[seed]\nadmin_password = \"s3cret-admin\"\nfarmer_password = \"s3cret-farmer\"\n",
        )
        .unwrap();
        assert!(!config.seed.uses_default_passwords());
    }

    #[test]
    fn test_default_roster() {
        let roster = SeedConfig::default().roster();
        assert_eq!(roster.len(), 6);
        assert_eq!(roster[0], SeedAccount::new("admin", "admin123", Role::Admin));
        assert_eq!(roster[5].username, "farmer5");
        assert!(roster[1..].iter().all(|a| a.role == Role::Farmer));
        assert!(SeedConfig::default().uses_default_passwords());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 5000);
    }
}
