use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clientele_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, FailureClass};

/// One reported setting: dotted key, rendered value and the env vars that
/// can set it, in lookup order.
struct Setting {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                FailureClass::ConfigValidation,
                format!("config validation failed: {error}"),
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(
            setting.key,
            setting.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(setting.key, &setting.value, source));
    }

    CommandResult::text(lines.join("\n"))
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let api_token = match &config.identity.api_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        Setting {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["CLIENTELE_DATABASE_URL"],
        },
        Setting {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["CLIENTELE_DATABASE_MAX_CONNECTIONS"],
        },
        Setting {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["CLIENTELE_DATABASE_TIMEOUT_SECS"],
        },
        Setting {
            key: "identity.base_url",
            value: config.identity.base_url.clone(),
            env_keys: &["CLIENTELE_IDENTITY_BASE_URL"],
        },
        Setting {
            key: "identity.api_token",
            value: api_token,
            env_keys: &["CLIENTELE_IDENTITY_API_TOKEN"],
        },
        Setting {
            key: "identity.timeout_secs",
            value: config.identity.timeout_secs.to_string(),
            env_keys: &["CLIENTELE_IDENTITY_TIMEOUT_SECS"],
        },
        Setting {
            key: "identity.default_profile_id",
            value: config.identity.default_profile_id.to_string(),
            env_keys: &["CLIENTELE_IDENTITY_DEFAULT_PROFILE_ID"],
        },
        Setting {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["CLIENTELE_SERVER_BIND_ADDRESS"],
        },
        Setting {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["CLIENTELE_SERVER_PORT"],
        },
        Setting {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["CLIENTELE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Setting {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["CLIENTELE_LOGGING_LEVEL", "CLIENTELE_LOG_LEVEL"],
        },
        Setting {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["CLIENTELE_LOGGING_FORMAT", "CLIENTELE_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("clientele.toml"), PathBuf::from("config/clientele.toml")]
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

/// Keeps at most the first four characters of long tokens.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if trimmed.chars().count() >= 12 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

use crate::commands::{CommandResult, FailureClass};

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_never_reveals_short_tokens() {
        assert_eq!(redact_token("   "), "<empty>");
        assert_eq!(redact_token("short"), "<redacted>");
        assert_eq!(redact_token("tok_1234567890abcdef"), "tok_***");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc: Value = "[identity]\nbase_url = \"http://users:8081\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "identity.base_url"));
        assert!(!contains_path(&doc, "identity.api_token"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
