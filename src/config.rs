use crate::utils::get_env_or;
use serde::Deserialize;
use std::{env, fs};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PORT: &str = "8080";
pub const RESERVED_LINK_ROUTES: [&str; 3] = ["/create", "/edit", "/delete"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub website: Website,
    pub authentication: Authentication,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reserved_management_endpoints: ReservedManagementEndpoints,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Website {
    pub name: String,
}

impl Default for Website {
    fn default() -> Self {
        Self {
            name: "Shortlinks".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllowedUser {
    pub username: String,
    pub password: String,
}

impl AllowedUser {
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

/// Where the access gate looks for the bearer token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenTransport {
    /// `token` field of a JSON request body.
    #[default]
    Body,
    /// `token` HTTP cookie.
    Cookie,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Authentication {
    pub signing_key: String,
    #[serde(default)]
    pub allowed_users: Vec<AllowedUser>,
    #[serde(default)]
    pub token_transport: TokenTransport,
    /// Tokens never expire unless this is set.
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: String,
    pub collection: String,
    pub max_connections: u32,
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: String::new(),
            collection: "links".into(),
            max_connections: 20,
            timeout_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReservedManagementEndpoints {
    pub login: String,
    pub logout: String,
    pub dashboard: String,
}

impl Default for ReservedManagementEndpoints {
    fn default() -> Self {
        Self {
            login: "/login".into(),
            logout: "/logout".into(),
            dashboard: "/dashboard".into(),
        }
    }
}

impl Config {
    /// Reads the YAML file named by `SHORTLINKS_CONFIG` (default `config.yaml`).
    pub fn load() -> Result<Self, ConfigError> {
        let path = get_env_or("SHORTLINKS_CONFIG", DEFAULT_CONFIG_PATH);
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&text)?;
        if let Ok(database_url) = env::var("DATABASE_URL") {
            config.store.database_url = database_url;
        }
        config.validate()?;
        tracing::info!("Configuration loaded from {}", path);
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authentication.signing_key.is_empty() {
            return Err(ConfigError::Invalid(
                "authentication.signing_key must not be empty".into(),
            ));
        }
        if self.store.backend == StoreBackend::Postgres && self.store.database_url.is_empty() {
            return Err(ConfigError::Invalid(
                "store.database_url (or DATABASE_URL) is required for the postgres backend".into(),
            ));
        }
        let endpoints = &self.reserved_management_endpoints;
        let routes = [&endpoints.login, &endpoints.logout, &endpoints.dashboard];
        for (index, route) in routes.iter().enumerate() {
            if !route.starts_with('/') || route.len() < 2 {
                return Err(ConfigError::Invalid(format!(
                    "management endpoint {route:?} must be an absolute path other than /"
                )));
            }
            if RESERVED_LINK_ROUTES.contains(&route.as_str()) || routes[..index].contains(route) {
                return Err(ConfigError::Invalid(format!(
                    "management endpoint {route:?} collides with another route"
                )));
            }
        }
        Ok(())
    }
}

pub fn listen_address() -> Result<String, ConfigError> {
    let port = get_env_or("PORT", DEFAULT_PORT);
    port.parse::<u16>()
        .map_err(|_| ConfigError::Invalid(format!("PORT {port:?} is not a valid port")))?;
    Ok(format!("0.0.0.0:{port}"))
}
