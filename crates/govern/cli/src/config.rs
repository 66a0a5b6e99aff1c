//! Configuration for govctl

use govern_types::{AccountDraft, Credential, Role};
use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Accounts created by `govctl seed`
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    Memory,

    /// SQLite storage
    Sqlite {
        /// Connection URL
        #[serde(default = "default_sqlite_url")]
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            url: default_sqlite_url(),
            max_connections: default_pool_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            accounts: vec![
                SeedAccount {
                    username: "admin".to_string(),
                    password: "admin123".to_string(),
                    role: Role::Administrator,
                    email: Some("admin@example.com".to_string()),
                    full_name: Some("Admin User".to_string()),
                    department: Some("IT".to_string()),
                },
                SeedAccount {
                    username: "analyst".to_string(),
                    password: "analyst123".to_string(),
                    role: Role::Analyst,
                    email: Some("analyst@example.com".to_string()),
                    full_name: Some("Data Analyst".to_string()),
                    department: Some("Business Intelligence".to_string()),
                },
            ],
        }
    }
}

/// A bootstrap account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

impl SeedAccount {
    pub fn into_draft(self) -> AccountDraft {
        AccountDraft {
            username: self.username,
            credential: Credential::Plain(self.password),
            role: self.role,
            email: self.email,
            full_name: self.full_name,
            department: self.department,
        }
        .seal()
    }
}

// Default value helpers
fn default_sqlite_url() -> String {
    "sqlite://govern.db".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GovernConfig {
    /// Load configuration: defaults, then an optional file, then `GOVERN__*` variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&GovernConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Nested keys use a double underscore, e.g. GOVERN__STORAGE__URL
        builder = builder.add_source(
            config::Environment::with_prefix("GOVERN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
