use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const CONFIG_FILE_NAME: &str = "paydesk.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub token: Option<SecretString>,
    pub user: String,
    pub role: String,
}

#[derive(Clone, Debug)]
pub struct DisplayConfig {
    pub utc_offset_minutes: i32,
}

impl DisplayConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub backend_url: Option<String>,
    pub backend_timeout_secs: Option<u64>,
    pub session_token: Option<String>,
    pub session_user: Option<String>,
    pub session_role: Option<String>,
    pub utc_offset_minutes: Option<i32>,
    pub log_level: Option<String>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig { base_url: DEFAULT_BACKEND_URL.to_string(), timeout_secs: 30 },
            session: SessionConfig {
                token: None,
                user: "operator".to_string(),
                role: "staff".to_string(),
            },
            display: DisplayConfig { utc_offset_minutes: 330 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.backend.base_url = normalize_base_url(&config.backend.base_url);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(backend) = patch.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(timeout_secs) = backend.timeout_secs {
                self.backend.timeout_secs = timeout_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(session_token_value) = session.token {
                self.session.token = Some(secret_value(session_token_value));
            }
            if let Some(user) = session.user {
                self.session.user = user;
            }
            if let Some(role) = session.role {
                self.session.role = role;
            }
        }

        if let Some(display) = patch.display {
            if let Some(utc_offset_minutes) = display.utc_offset_minutes {
                self.display.utc_offset_minutes = utc_offset_minutes;
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
        if let Some(value) = read_env("PAYDESK_BACKEND_URL") {
            self.backend.base_url = value;
        }
        if let Some(value) = read_env("PAYDESK_BACKEND_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_u64("PAYDESK_BACKEND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PAYDESK_SESSION_TOKEN") {
            self.session.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("PAYDESK_SESSION_USER") {
            self.session.user = value;
        }
        if let Some(value) = read_env("PAYDESK_SESSION_ROLE") {
            self.session.role = value;
        }

        if let Some(value) = read_env("PAYDESK_DISPLAY_UTC_OFFSET_MINUTES") {
            self.display.utc_offset_minutes =
                parse_i32("PAYDESK_DISPLAY_UTC_OFFSET_MINUTES", &value)?;
        }

        let log_level =
            read_env("PAYDESK_LOGGING_LEVEL").or_else(|| read_env("PAYDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PAYDESK_LOGGING_FORMAT").or_else(|| read_env("PAYDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(backend_url) = overrides.backend_url {
            self.backend.base_url = backend_url;
        }
        if let Some(timeout_secs) = overrides.backend_timeout_secs {
            self.backend.timeout_secs = timeout_secs;
        }
        if let Some(session_token) = overrides.session_token {
            self.session.token = Some(secret_value(session_token));
        }
        if let Some(session_user) = overrides.session_user {
            self.session.user = session_user;
        }
        if let Some(session_role) = overrides.session_role {
            self.session.role = session_role;
        }
        if let Some(utc_offset_minutes) = overrides.utc_offset_minutes {
            self.display.utc_offset_minutes = utc_offset_minutes;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_backend(&self.backend)?;
        validate_session(&self.session)?;
        validate_display(&self.display)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Drops trailing slashes so paths can be appended with a single `/`.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// Explicit path if it exists, else `paydesk.toml` or `config/paydesk.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from("config").join(CONFIG_FILE_NAME)]
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
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ConfigError> {
    let url = backend.base_url.as_str();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "backend.base_url must start with http:// or https:// (got `{url}`)"
        )));
    }

    if backend.timeout_secs == 0 || backend.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "backend.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if let Some(token) = &session.token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "session.token must not be blank; remove it to run signed out".to_string(),
            ));
        }
    }

    if session.user.trim().is_empty() {
        return Err(ConfigError::Validation("session.user must not be empty".to_string()));
    }

    if session.role.trim().is_empty() {
        return Err(ConfigError::Validation(
            "session.role must not be empty (use `manager` to approve or reject requests)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_display(display: &DisplayConfig) -> Result<(), ConfigError> {
    if !(-720..=840).contains(&display.utc_offset_minutes) {
        return Err(ConfigError::Validation(
            "display.utc_offset_minutes must be in range -720..=840".to_string(),
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

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.trim().parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    backend: Option<BackendPatch>,
    session: Option<SessionPatch>,
    display: Option<DisplayPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    token: Option<String>,
    user: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplayPatch {
    utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const PAYDESK_VARS: &[&str] = &[
        "PAYDESK_BACKEND_URL",
        "PAYDESK_BACKEND_TIMEOUT_SECS",
        "PAYDESK_SESSION_TOKEN",
        "PAYDESK_SESSION_USER",
        "PAYDESK_SESSION_ROLE",
        "PAYDESK_DISPLAY_UTC_OFFSET_MINUTES",
        "PAYDESK_LOGGING_LEVEL",
        "PAYDESK_LOGGING_FORMAT",
        "PAYDESK_LOG_LEVEL",
        "PAYDESK_LOG_FORMAT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_run_signed_out_against_local_backend() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(PAYDESK_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.backend.base_url == "http://localhost:5000", "default backend url")?;
        ensure(config.session.token.is_none(), "no token by default")?;
        ensure(config.session.role == "staff", "default role is not manager")?;
        ensure(config.display.offset().local_minus_utc() == 330 * 60, "default IST offset")?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(PAYDESK_VARS);

        env::set_var("TEST_PAYDESK_TOKEN", "tok-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("paydesk.toml");
            fs::write(
                &path,
                r#"
[backend]
base_url = "https://api.example.com/"

[session]
token = "${TEST_PAYDESK_TOKEN}"
role = "manager"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.session.token.as_ref().map(|token| token.expose_secret())
                    == Some("tok-from-env"),
                "token should be interpolated from environment",
            )?;
            ensure(
                config.backend.base_url == "https://api.example.com",
                "trailing slash should be stripped from backend url",
            )?;
            ensure(config.session.role == "manager", "role should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_PAYDESK_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(PAYDESK_VARS);

        env::set_var("PAYDESK_LOG_LEVEL", "warn");
        env::set_var("PAYDESK_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(PAYDESK_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(PAYDESK_VARS);

        env::set_var("PAYDESK_BACKEND_URL", "https://from-env.example.com");
        env::set_var("PAYDESK_SESSION_ROLE", "manager");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("paydesk.toml");
            fs::write(
                &path,
                r#"
[backend]
base_url = "https://from-file.example.com"
timeout_secs = 12

[session]
role = "staff"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    backend_url: Some("https://from-override.example.com".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.backend.base_url == "https://from-override.example.com",
                "override backend url should win",
            )?;
            ensure(config.backend.timeout_secs == 12, "file timeout should win over default")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.session.role == "manager", "env role should win over file")?;
            Ok(())
        })();

        clear_vars(PAYDESK_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(PAYDESK_VARS);

        env::set_var("PAYDESK_BACKEND_URL", "ftp://files.example.com");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("backend.base_url")
            );
            ensure(has_message, "validation failure should mention backend.base_url")
        })();

        clear_vars(PAYDESK_VARS);
        result
    }

    #[test]
    fn malformed_numeric_env_is_reported_with_its_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(PAYDESK_VARS);

        env::set_var("PAYDESK_DISPLAY_UTC_OFFSET_MINUTES", "ist");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "PAYDESK_DISPLAY_UTC_OFFSET_MINUTES",
                "error should name the offending variable",
            ),
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override error".to_string()),
        };

        clear_vars(PAYDESK_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(PAYDESK_VARS);

        env::set_var("PAYDESK_SESSION_TOKEN", "tok-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("tok-secret-value"), "debug output should not contain token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(PAYDESK_VARS);
        result
    }
}
