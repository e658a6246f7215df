use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use atelier_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in effective_values(&config) {
        let source = field_source(
            key_path,
            env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

/// Every reported field with its rendered value and the env keys that can
/// override it, first match wins.
fn effective_values(config: &AppConfig) -> Vec<(&'static str, String, &'static [&'static str])> {
    vec![
        ("database.url", config.database.url.clone(), &["ATELIER_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["ATELIER_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["ATELIER_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "storage.provider",
            format!("{:?}", config.storage.provider),
            &["ATELIER_STORAGE_PROVIDER"],
        ),
        (
            "storage.local_root",
            config.storage.local_root.display().to_string(),
            &["ATELIER_STORAGE_LOCAL_ROOT"],
        ),
        (
            "storage.base_url",
            config.storage.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["ATELIER_STORAGE_BASE_URL"],
        ),
        (
            "storage.service_key",
            redact_secret(config.storage.service_key.as_ref()),
            &["ATELIER_STORAGE_SERVICE_KEY"],
        ),
        (
            "storage.variant_bucket",
            config.storage.variant_bucket.clone(),
            &["ATELIER_STORAGE_VARIANT_BUCKET"],
        ),
        ("email.enabled", config.email.enabled.to_string(), &["ATELIER_EMAIL_ENABLED"]),
        (
            "email.function_url",
            config.email.function_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["ATELIER_EMAIL_FUNCTION_URL"],
        ),
        (
            "email.api_key",
            redact_secret(config.email.api_key.as_ref()),
            &["ATELIER_EMAIL_API_KEY"],
        ),
        (
            "email.from_address",
            config.email.from_address.clone(),
            &["ATELIER_EMAIL_FROM_ADDRESS"],
        ),
        (
            "customization.slug_cache_ttl_secs",
            config.customization.slug_cache_ttl_secs.to_string(),
            &["ATELIER_CUSTOMIZATION_SLUG_CACHE_TTL_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["ATELIER_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["ATELIER_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["ATELIER_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["ATELIER_LOGGING_LEVEL", "ATELIER_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["ATELIER_LOGGING_FORMAT", "ATELIER_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("atelier.toml"), PathBuf::from("config/atelier.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        None => "<unset>".to_string(),
        Some(secret) if secret.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}
