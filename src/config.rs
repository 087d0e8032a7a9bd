use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use crate::cache::{
    CacheSettings, DEFAULT_MEMORY_CAPACITY, DEFAULT_PERSISTENT_CAPACITY, DEFAULT_TTL, WORKLOG_TTL,
};
use crate::deployment::{resolve_api_version, DeploymentKind};
use crate::error::JiraError;
use crate::pagination::{PaginationLimits, DEFAULT_DROPDOWN_CAP, DEFAULT_HARD_CAP};

/// Immutable connection settings for one client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    kind: DeploymentKind,
    host: String,
    username: String,
    api_token: String,
}

impl ClientConfig {
    pub fn new(
        kind: DeploymentKind,
        host: &str,
        username: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, JiraError> {
        let username = username.into();
        let api_token = api_token.into();
        if username.trim().is_empty() {
            return Err(JiraError::invalid("username must not be empty"));
        }
        if api_token.trim().is_empty() {
            return Err(JiraError::invalid("api token must not be empty"));
        }

        Ok(Self {
            kind,
            host: normalize_host(host)?,
            username,
            api_token,
        })
    }

    pub fn kind(&self) -> DeploymentKind {
        self.kind
    }

    /// Scheme, authority and any context path, without a trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_version(&self) -> &'static str {
        resolve_api_version(self.kind)
    }

    /// `Basic base64(username:token)`.
    pub fn authorization_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.api_token);
        format!("Basic {}", BASE64.encode(raw))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

fn normalize_host(raw: &str) -> Result<String, JiraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JiraError::invalid(format!("invalid jira host '{raw}'")));
    }

    let mut candidate = trimmed.to_string();

    if candidate.starts_with("https://https//") {
        candidate = candidate.replacen("https://https//", "https://", 1);
    } else if candidate.starts_with("http://http//") {
        candidate = candidate.replacen("http://http//", "http://", 1);
    }

    if candidate.starts_with("https//") {
        candidate = format!("https://{}", candidate.trim_start_matches("https//"));
    } else if candidate.starts_with("http//") {
        candidate = format!("http://{}", candidate.trim_start_matches("http//"));
    } else if !candidate.starts_with("https://") && !candidate.starts_with("http://") {
        candidate = format!("https://{candidate}");
    }

    let parsed = reqwest::Url::parse(&candidate)
        .map_err(|_| JiraError::invalid(format!("invalid jira host '{raw}'")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| JiraError::invalid(format!("invalid jira host '{raw}'")))?;

    let mut base = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        base.push_str(&format!(":{port}"));
    }
    base.push_str(parsed.path().trim_end_matches('/'));
    Ok(base)
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub jira: JiraConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub deployment: DeploymentKind,
    pub host: String,
    pub username: String,
    pub api_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Empty disables the persistent tier.
    #[serde(default)]
    pub db_path: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_worklog_ttl_secs")]
    pub worklog_ttl_secs: u64,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default = "default_persistent_capacity")]
    pub persistent_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            ttl_secs: default_ttl_secs(),
            worklog_ttl_secs: default_worklog_ttl_secs(),
            memory_capacity: default_memory_capacity(),
            persistent_capacity: default_persistent_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,
    #[serde(default = "default_dropdown_cap")]
    pub dropdown_cap: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            hard_cap: default_hard_cap(),
            dropdown_cap: default_dropdown_cap(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Default)]
pub struct AppConfigOverrides {
    pub jira_deployment: Option<DeploymentKind>,
    pub jira_host: Option<String>,
    pub jira_username: Option<String>,
    pub jira_api_token: Option<String>,
    pub cache_db_path: Option<String>,
    pub logging_debug: Option<bool>,
}

impl AppConfigOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jira_deployment = match non_empty("JIRA_DEPLOYMENT") {
            Some(raw) => Some(raw.parse::<DeploymentKind>().map_err(ConfigError::Invalid)?),
            None => None,
        };

        Ok(Self {
            jira_deployment,
            jira_host: non_empty("JIRA_HOST"),
            jira_username: non_empty("JIRA_USERNAME"),
            jira_api_token: non_empty("JIRA_API_TOKEN"),
            cache_db_path: lookup("JIRA_WORKLOG_CACHE_DB"),
            logging_debug: non_empty("JIRA_WORKLOG_DEBUG").map(|v| crate::logging::parse_flag(&v)),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found at {path}. expected at $XDG_CONFIG_HOME/jira-worklog/config.toml or ~/.config/jira-worklog/config.toml")]
    MissingConfigFile { path: PathBuf },
    #[error("failed to resolve config path: HOME is not set and XDG_CONFIG_HOME is unset")]
    MissingHomeDirectory,
    #[error("failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse TOML config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load() -> Result<AppConfig, ConfigError> {
    let path = resolve_config_path()?;
    load_from(&path)
}

pub fn load_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let path = path.to_path_buf();
    let raw = std::fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingConfigFile { path: path.clone() }
        } else {
            ConfigError::ReadFailed {
                path: path.clone(),
                source,
            }
        }
    })?;

    let cfg = toml::from_str::<AppConfig>(&raw).map_err(|source| ConfigError::ParseFailed {
        path: path.clone(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    let xdg_config_home = std::env::var_os("XDG_CONFIG_HOME");
    let home = std::env::var_os("HOME");
    resolve_config_path_from_env(xdg_config_home, home)
}

fn resolve_config_path_from_env(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = xdg_config_home.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join("jira-worklog").join("config.toml"));
    }

    let home = home
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("jira-worklog")
        .join("config.toml"))
}

impl AppConfig {
    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) -> Result<(), ConfigError> {
        if let Some(value) = overrides.jira_deployment {
            self.jira.deployment = value;
        }
        if let Some(value) = &overrides.jira_host {
            self.jira.host = value.clone();
        }
        if let Some(value) = &overrides.jira_username {
            self.jira.username = value.clone();
        }
        if let Some(value) = &overrides.jira_api_token {
            self.jira.api_token = value.clone();
        }
        if let Some(value) = &overrides.cache_db_path {
            self.cache.db_path = value.clone();
        }
        if let Some(value) = overrides.logging_debug {
            self.logging.debug = value;
        }

        self.validate()
    }

    pub fn client_config(&self) -> Result<ClientConfig, JiraError> {
        ClientConfig::new(
            self.jira.deployment,
            &self.jira.host,
            self.jira.username.clone(),
            self.jira.api_token.clone(),
        )
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            default_ttl: Duration::from_secs(self.cache.ttl_secs),
            worklog_ttl: Duration::from_secs(self.cache.worklog_ttl_secs),
            memory_capacity: self.cache.memory_capacity,
        }
    }

    pub fn pagination_limits(&self) -> PaginationLimits {
        PaginationLimits {
            hard_cap: self.pagination.hard_cap,
            dropdown_cap: self.pagination.dropdown_cap,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jira.host.trim().is_empty() {
            return Err(ConfigError::Invalid("jira.host must not be empty".into()));
        }
        if self.jira.username.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jira.username must not be empty".into(),
            ));
        }
        if self.jira.api_token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jira.api_token must not be empty".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be > 0".into()));
        }
        if self.cache.worklog_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.worklog_ttl_secs must be > 0".into(),
            ));
        }
        if self.cache.memory_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.memory_capacity must be > 0".into(),
            ));
        }
        if self.cache.persistent_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.persistent_capacity must be > 0".into(),
            ));
        }
        if self.pagination.hard_cap == 0 || self.pagination.dropdown_cap == 0 {
            return Err(ConfigError::Invalid(
                "pagination caps must be > 0".into(),
            ));
        }
        if self.pagination.dropdown_cap > self.pagination.hard_cap {
            return Err(ConfigError::Invalid(
                "pagination.dropdown_cap must not exceed pagination.hard_cap".into(),
            ));
        }

        Ok(())
    }
}

const fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

const fn default_worklog_ttl_secs() -> u64 {
    WORKLOG_TTL.as_secs()
}

const fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

const fn default_persistent_capacity() -> usize {
    DEFAULT_PERSISTENT_CAPACITY
}

const fn default_hard_cap() -> usize {
    DEFAULT_HARD_CAP
}

const fn default_dropdown_cap() -> usize {
    DEFAULT_DROPDOWN_CAP
}
