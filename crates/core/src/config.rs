use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub email: EmailConfig,
    pub customization: CustomizationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Where pre-rendered variant images live.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub local_root: PathBuf,
    pub base_url: Option<String>,
    pub service_key: Option<SecretString>,
    pub variant_bucket: String,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub enabled: bool,
    pub function_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub from_address: String,
}

#[derive(Clone, Debug)]
pub struct CustomizationConfig {
    pub slug_cache_ttl_secs: u64,
}

impl CustomizationConfig {
    pub fn slug_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.slug_cache_ttl_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageProvider {
    Local,
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub storage_provider: Option<StorageProvider>,
    pub storage_local_root: Option<PathBuf>,
    pub storage_base_url: Option<String>,
    pub email_enabled: Option<bool>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_VARIANT_BUCKET: &str = "customization-item";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://atelier.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            storage: StorageConfig {
                provider: StorageProvider::Local,
                local_root: PathBuf::from("storage"),
                base_url: None,
                service_key: None,
                variant_bucket: DEFAULT_VARIANT_BUCKET.to_string(),
            },
            email: EmailConfig {
                enabled: false,
                function_url: None,
                api_key: None,
                from_address: "atelier@localhost".to_string(),
            },
            customization: CustomizationConfig { slug_cache_ttl_secs: 300 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for StorageProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported storage provider `{other}` (expected local|http)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("atelier.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(provider) = storage.provider {
                self.storage.provider = provider;
            }
            if let Some(local_root) = storage.local_root {
                self.storage.local_root = local_root;
            }
            if let Some(base_url) = storage.base_url {
                self.storage.base_url = Some(base_url);
            }
            if let Some(service_key) = storage.service_key {
                self.storage.service_key = Some(secret_value(service_key));
            }
            if let Some(variant_bucket) = storage.variant_bucket {
                self.storage.variant_bucket = variant_bucket;
            }
        }

        if let Some(email) = patch.email {
            if let Some(enabled) = email.enabled {
                self.email.enabled = enabled;
            }
            if let Some(function_url) = email.function_url {
                self.email.function_url = Some(function_url);
            }
            if let Some(api_key) = email.api_key {
                self.email.api_key = Some(secret_value(api_key));
            }
            if let Some(from_address) = email.from_address {
                self.email.from_address = from_address;
            }
        }

        if let Some(customization) = patch.customization {
            if let Some(ttl) = customization.slug_cache_ttl_secs {
                self.customization.slug_cache_ttl_secs = ttl;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ATELIER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ATELIER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("ATELIER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ATELIER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ATELIER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ATELIER_STORAGE_PROVIDER") {
            self.storage.provider = value.parse()?;
        }
        if let Some(value) = read_env("ATELIER_STORAGE_LOCAL_ROOT") {
            self.storage.local_root = PathBuf::from(value);
        }
        if let Some(value) = read_env("ATELIER_STORAGE_BASE_URL") {
            self.storage.base_url = Some(value);
        }
        if let Some(value) = read_env("ATELIER_STORAGE_SERVICE_KEY") {
            self.storage.service_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ATELIER_STORAGE_VARIANT_BUCKET") {
            self.storage.variant_bucket = value;
        }

        if let Some(value) = read_env("ATELIER_EMAIL_ENABLED") {
            self.email.enabled = parse_bool("ATELIER_EMAIL_ENABLED", &value)?;
        }
        if let Some(value) = read_env("ATELIER_EMAIL_FUNCTION_URL") {
            self.email.function_url = Some(value);
        }
        if let Some(value) = read_env("ATELIER_EMAIL_API_KEY") {
            self.email.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ATELIER_EMAIL_FROM_ADDRESS") {
            self.email.from_address = value;
        }

        if let Some(value) = read_env("ATELIER_CUSTOMIZATION_SLUG_CACHE_TTL_SECS") {
            self.customization.slug_cache_ttl_secs =
                parse_u64("ATELIER_CUSTOMIZATION_SLUG_CACHE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("ATELIER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ATELIER_SERVER_PORT") {
            self.server.port = parse_u16("ATELIER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ATELIER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ATELIER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("ATELIER_LOGGING_LEVEL").or_else(|| read_env("ATELIER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ATELIER_LOGGING_FORMAT").or_else(|| read_env("ATELIER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.storage_provider {
            self.storage.provider = provider;
        }
        if let Some(local_root) = overrides.storage_local_root {
            self.storage.local_root = local_root;
        }
        if let Some(base_url) = overrides.storage_base_url {
            self.storage.base_url = Some(base_url);
        }
        if let Some(enabled) = overrides.email_enabled {
            self.email.enabled = enabled;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_storage(&self.storage)?;
        validate_email(&self.email)?;
        validate_customization(&self.customization)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("atelier.toml"), PathBuf::from("config/atelier.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }

        chars.next();
        let mut key = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => key.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        let value =
            env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
        output.push_str(&value);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.variant_bucket.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.variant_bucket must not be empty".to_string(),
        ));
    }

    match storage.provider {
        StorageProvider::Local => {
            if storage.local_root.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "storage.local_root is required for the local provider".to_string(),
                ));
            }
        }
        StorageProvider::Http => {
            let base_url = storage.base_url.as_deref().map(str::trim).unwrap_or_default();
            if !is_http_url(base_url) {
                return Err(ConfigError::Validation(
                    "storage.base_url must start with http:// or https:// for the http provider"
                        .to_string(),
                ));
            }
            let missing_key = storage
                .service_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing_key {
                return Err(ConfigError::Validation(
                    "storage.service_key is required for the http provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if !email.from_address.contains('@') {
        return Err(ConfigError::Validation(
            "email.from_address must be an email address".to_string(),
        ));
    }

    if !email.enabled {
        return Ok(());
    }

    let function_url = email.function_url.as_deref().map(str::trim).unwrap_or_default();
    if !is_http_url(function_url) {
        return Err(ConfigError::Validation(
            "email.enabled is true but email.function_url is missing or not an http(s) URL"
                .to_string(),
        ));
    }

    let missing_key = email
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "email.enabled is true but email.api_key is missing".to_string(),
        ));
    }

    Ok(())
}

fn validate_customization(customization: &CustomizationConfig) -> Result<(), ConfigError> {
    if customization.slug_cache_ttl_secs == 0 || customization.slug_cache_ttl_secs > 86_400 {
        return Err(ConfigError::Validation(
            "customization.slug_cache_ttl_secs must be in range 1..=86400".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    storage: Option<StoragePatch>,
    email: Option<EmailPatch>,
    customization: Option<CustomizationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    provider: Option<StorageProvider>,
    local_root: Option<PathBuf>,
    base_url: Option<String>,
    service_key: Option<String>,
    variant_bucket: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    enabled: Option<bool>,
    function_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomizationPatch {
    slug_cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
