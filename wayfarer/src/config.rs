use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file read by [`WayfarerConfig::from_env`].
pub const CONFIG_ENV: &str = "WAYFARER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("environment variable {0} not set")]
    MissingEnv(String),
}

/// Configuration stored in `wayfarer.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WayfarerConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub media: MediaSettings,
    #[serde(default)]
    pub push: PushSettings,
    #[serde(default)]
    pub pagination: PaginationSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_redis_url(),
            prefix: default_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_prefix() -> String {
    "wayfarer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_access_secret")]
    pub access_secret: String,
    #[serde(default = "default_refresh_secret")]
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_argon2_memory")]
    pub argon2_memory_kib: u32,
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_secret: default_access_secret(),
            refresh_secret: default_refresh_secret(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            argon2_memory_kib: default_argon2_memory(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

fn default_access_secret() -> String {
    "${WAYFARER_ACCESS_SECRET}".to_string()
}

fn default_refresh_secret() -> String {
    "${WAYFARER_REFRESH_SECRET}".to_string()
}

fn default_access_ttl() -> i64 {
    24 * 60 * 60
}

fn default_refresh_ttl() -> i64 {
    7 * 24 * 60 * 60
}

fn default_argon2_memory() -> u32 {
    19 * 1024
}

fn default_argon2_iterations() -> u32 {
    2
}

fn default_argon2_parallelism() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Root folder every upload folder is nested under.
    #[serde(default = "default_media_root")]
    pub root_folder: String,
    #[serde(default = "default_media_base_url")]
    pub base_url: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            root_folder: default_media_root(),
            base_url: default_media_base_url(),
        }
    }
}

fn default_media_root() -> String {
    "travel-diary".to_string()
}

fn default_media_base_url() -> String {
    "https://media.wayfarer.local".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettings {
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,
    /// Upper bound on a single dispatcher call.
    #[serde(default = "default_push_timeout")]
    pub timeout_ms: u64,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            timeout_ms: default_push_timeout(),
        }
    }
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_timeout() -> u64 {
    5_000
}

/// Default page sizes per listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "default_feed_page")]
    pub feed: u64,
    #[serde(default = "default_user_posts_page")]
    pub user_posts: u64,
    #[serde(default = "default_twenty")]
    pub comments: u64,
    #[serde(default = "default_twenty")]
    pub replies: u64,
    #[serde(default = "default_messages_page")]
    pub messages: u64,
    #[serde(default = "default_twenty")]
    pub mails: u64,
    #[serde(default = "default_twenty")]
    pub notifications: u64,
    #[serde(default = "default_twenty")]
    pub search: usize,
    /// Upper bound for any client-supplied page size.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            feed: default_feed_page(),
            user_posts: default_user_posts_page(),
            comments: default_twenty(),
            replies: default_twenty(),
            messages: default_messages_page(),
            mails: default_twenty(),
            notifications: default_twenty(),
            search: 20,
            max_limit: default_max_limit(),
        }
    }
}

fn default_max_limit() -> u64 {
    100
}

fn default_feed_page() -> u64 {
    10
}

fn default_user_posts_page() -> u64 {
    12
}

fn default_messages_page() -> u64 {
    50
}

fn default_twenty<N: From<u8>>() -> N {
    N::from(20)
}

/// Expands a whole-value `${VAR}` reference from the environment; other values pass through.
pub fn expand_env(value: &str) -> Result<String, ConfigError> {
    if let Some(var_name) = value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        std::env::var(var_name).map_err(|_| ConfigError::MissingEnv(var_name.to_string()))
    } else {
        Ok(value.to_string())
    }
}

impl WayfarerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads the file named by `WAYFARER_CONFIG`, or defaults when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn redis_url(&self) -> Result<String, ConfigError> {
        expand_env(&self.store.url)
    }

    pub fn access_secret(&self) -> Result<String, ConfigError> {
        expand_env(&self.auth.access_secret)
    }

    pub fn refresh_secret(&self) -> Result<String, ConfigError> {
        expand_env(&self.auth.refresh_secret)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = WayfarerConfig::default();
        assert_eq!(config.store.url, "${REDIS_URL}");
        assert_eq!(config.store.prefix, "wayfarer");
        assert_eq!(config.pagination.feed, 10);
        assert_eq!(config.pagination.user_posts, 12);
        assert_eq!(config.pagination.messages, 50);
        assert_eq!(config.pagination.search, 20);
        assert_eq!(config.pagination.max_limit, 100);
        assert_eq!(config.auth.access_ttl_secs, 86_400);
    }

    #[test]
    fn test_config_serialization() {
        let config = WayfarerConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("refresh_ttl_secs"));
        let parsed: WayfarerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.media.root_folder, "travel-diary");
    }

    #[test]
    fn loads_partial_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nbackend = \"memory\"\nprefix = \"trip\"\n\n[push]\ntimeout_ms = 250").unwrap();
        let config = WayfarerConfig::load(file.path()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.prefix, "trip");
        assert_eq!(config.push.timeout_ms, 250);
        assert!(config.push.enabled);
        assert_eq!(config.pagination.comments, 20);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = WayfarerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn expand_env_passes_literals_through() {
        assert_eq!(expand_env("plain").unwrap(), "plain");
        assert!(matches!(
            expand_env("${WAYFARER_TEST_SURELY_UNSET_VAR}"),
            Err(ConfigError::MissingEnv(name)) if name == "WAYFARER_TEST_SURELY_UNSET_VAR"
        ));
    }
}
