use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quoteworks_core::config::{AppConfig, LoadOptions};
use serde_json::{json, Map, Value};

use crate::commands::{CommandResult, EXIT_CONFIG};

/// Keys reported with their source, paired with the environment variable
/// that overrides them.
const TRACKED_KEYS: &[(&str, &str)] = &[
    ("database.url", "QUOTEWORKS_DATABASE_URL"),
    ("database.max_connections", "QUOTEWORKS_DATABASE_MAX_CONNECTIONS"),
    ("database.timeout_secs", "QUOTEWORKS_DATABASE_TIMEOUT_SECS"),
    ("server.bind_address", "QUOTEWORKS_SERVER_BIND_ADDRESS"),
    ("server.port", "QUOTEWORKS_SERVER_PORT"),
    ("server.graceful_shutdown_secs", "QUOTEWORKS_SERVER_GRACEFUL_SHUTDOWN_SECS"),
    ("auth.gateway_token", "QUOTEWORKS_AUTH_GATEWAY_TOKEN"),
    ("documents.template_dir", "QUOTEWORKS_DOCUMENTS_TEMPLATE_DIR"),
    ("documents.converter", "QUOTEWORKS_DOCUMENTS_CONVERTER"),
    ("logging.level", "QUOTEWORKS_LOGGING_LEVEL"),
    ("logging.format", "QUOTEWORKS_LOGGING_FORMAT"),
];

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = detect_config_path(explicit_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut sources = Map::new();
    for (key, env_key) in TRACKED_KEYS {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        sources.insert((*key).to_string(), Value::String(source));
    }

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        Some(json!({ "config": config.redacted(), "sources": sources })),
    )
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("quoteworks.toml"), PathBuf::from("config/quoteworks.toml")]
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<toml::Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<toml::Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&toml::Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

fn contains_path(root: &toml::Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
