use std::env;
use std::fs;
use std::path::Path;

use paydesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field<'a> {
    key_path: &'static str,
    value: String,
    env_keys: &'a [&'static str],
    overridden: bool,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = options.overrides.clone();

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

    let session_token = match &config.session.token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    let fields = [
        Field {
            key_path: "backend.base_url",
            value: config.backend.base_url.clone(),
            env_keys: &["PAYDESK_BACKEND_URL"],
            overridden: overrides.backend_url.is_some(),
        },
        Field {
            key_path: "backend.timeout_secs",
            value: config.backend.timeout_secs.to_string(),
            env_keys: &["PAYDESK_BACKEND_TIMEOUT_SECS"],
            overridden: overrides.backend_timeout_secs.is_some(),
        },
        Field {
            key_path: "session.token",
            value: session_token,
            env_keys: &["PAYDESK_SESSION_TOKEN"],
            overridden: overrides.session_token.is_some(),
        },
        Field {
            key_path: "session.user",
            value: config.session.user.clone(),
            env_keys: &["PAYDESK_SESSION_USER"],
            overridden: overrides.session_user.is_some(),
        },
        Field {
            key_path: "session.role",
            value: config.session.role.clone(),
            env_keys: &["PAYDESK_SESSION_ROLE"],
            overridden: overrides.session_role.is_some(),
        },
        Field {
            key_path: "display.utc_offset_minutes",
            value: config.display.utc_offset_minutes.to_string(),
            env_keys: &["PAYDESK_DISPLAY_UTC_OFFSET_MINUTES"],
            overridden: overrides.utc_offset_minutes.is_some(),
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["PAYDESK_LOGGING_LEVEL", "PAYDESK_LOG_LEVEL"],
            overridden: overrides.log_level.is_some(),
        },
        Field {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["PAYDESK_LOGGING_FORMAT", "PAYDESK_LOG_FORMAT"],
            overridden: false,
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in &fields {
        let source =
            field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key_path, field.value));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field<'_>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "flag".to_string();
    }

    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
