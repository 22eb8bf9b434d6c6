use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub line: LineConfig,
    pub admin: AdminConfig,
    pub server: ServerConfig,
    pub guard: GuardConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LineConfig {
    pub channel_access_token: SecretString,
    pub channel_secret: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub username: String,
    pub password: SecretString,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct GuardConfig {
    pub allowed_groups: Vec<String>,
    pub welcome_on_join: bool,
}

#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub path: PathBuf,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub channel_access_token: Option<String>,
    pub channel_secret: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub server_port: Option<u16>,
    pub allowed_groups: Option<Vec<String>>,
    pub export_path: Option<PathBuf>,
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

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LINE_API_BASE_URL: &str = "https://api.line.me";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://nickname.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            line: LineConfig {
                channel_access_token: String::new().into(),
                channel_secret: String::new().into(),
                api_base_url: DEFAULT_LINE_API_BASE_URL.to_string(),
            },
            admin: AdminConfig { username: String::new(), password: String::new().into() },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: DEFAULT_PORT },
            guard: GuardConfig { allowed_groups: Vec::new(), welcome_on_join: true },
            export: ExportConfig { path: PathBuf::from("nicknames.xlsx") },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("nickbook.toml"));
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

        if let Some(line) = patch.line {
            if let Some(token) = line.channel_access_token {
                self.line.channel_access_token = secret_value(token);
            }
            if let Some(secret) = line.channel_secret {
                self.line.channel_secret = secret_value(secret);
            }
            if let Some(api_base_url) = line.api_base_url {
                self.line.api_base_url = api_base_url;
            }
        }

        if let Some(admin) = patch.admin {
            if let Some(username) = admin.username {
                self.admin.username = username;
            }
            if let Some(password) = admin.password {
                self.admin.password = secret_value(password);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(guard) = patch.guard {
            if let Some(allowed_groups) = guard.allowed_groups {
                self.guard.allowed_groups = normalize_groups(allowed_groups);
            }
            if let Some(welcome_on_join) = guard.welcome_on_join {
                self.guard.welcome_on_join = welcome_on_join;
            }
        }

        if let Some(export) = patch.export {
            if let Some(path) = export.path {
                self.export.path = path;
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
        if let Some(value) = read_env("NICKBOOK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("NICKBOOK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("NICKBOOK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("NICKBOOK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("NICKBOOK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let access_token = read_env("NICKBOOK_LINE_CHANNEL_ACCESS_TOKEN")
            .or_else(|| read_env("CHANNEL_ACCESS_TOKEN"));
        if let Some(value) = access_token {
            self.line.channel_access_token = secret_value(value);
        }
        let channel_secret =
            read_env("NICKBOOK_LINE_CHANNEL_SECRET").or_else(|| read_env("CHANNEL_SECRET"));
        if let Some(value) = channel_secret {
            self.line.channel_secret = secret_value(value);
        }
        if let Some(value) = read_env("NICKBOOK_LINE_API_BASE_URL") {
            self.line.api_base_url = value;
        }

        let admin_username =
            read_env("NICKBOOK_ADMIN_USERNAME").or_else(|| read_env("ADMIN_USERNAME"));
        if let Some(value) = admin_username {
            self.admin.username = value;
        }
        let admin_password =
            read_env("NICKBOOK_ADMIN_PASSWORD").or_else(|| read_env("ADMIN_PASSWORD"));
        if let Some(value) = admin_password {
            self.admin.password = secret_value(value);
        }

        if let Some(value) = read_env("NICKBOOK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("NICKBOOK_SERVER_PORT") {
            self.server.port = parse_u16("NICKBOOK_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }

        if let Some(value) = read_env("NICKBOOK_ALLOWED_GROUPS") {
            self.guard.allowed_groups =
                normalize_groups(value.split(',').map(str::to_owned).collect());
        }
        if let Some(value) = read_env("NICKBOOK_WELCOME_ON_JOIN") {
            self.guard.welcome_on_join = parse_bool("NICKBOOK_WELCOME_ON_JOIN", &value)?;
        }

        if let Some(value) = read_env("NICKBOOK_EXPORT_PATH") {
            self.export.path = PathBuf::from(value);
        }

        let log_level =
            read_env("NICKBOOK_LOGGING_LEVEL").or_else(|| read_env("NICKBOOK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("NICKBOOK_LOGGING_FORMAT").or_else(|| read_env("NICKBOOK_LOG_FORMAT"));
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
        if let Some(token) = overrides.channel_access_token {
            self.line.channel_access_token = secret_value(token);
        }
        if let Some(secret) = overrides.channel_secret {
            self.line.channel_secret = secret_value(secret);
        }
        if let Some(username) = overrides.admin_username {
            self.admin.username = username;
        }
        if let Some(password) = overrides.admin_password {
            self.admin.password = secret_value(password);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(allowed_groups) = overrides.allowed_groups {
            self.guard.allowed_groups = normalize_groups(allowed_groups);
        }
        if let Some(export_path) = overrides.export_path {
            self.export.path = export_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_line(&self.line)?;
        validate_admin(&self.admin)?;
        validate_server(&self.server)?;
        validate_export(&self.export)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn normalize_groups(groups: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = groups
        .into_iter()
        .map(|group| group.trim().to_owned())
        .filter(|group| !group.is_empty())
        .collect();
    normalized.dedup();
    normalized
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("nickbook.toml"), PathBuf::from("config/nickbook.toml")]
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

fn validate_line(line: &LineConfig) -> Result<(), ConfigError> {
    if line.channel_access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.channel_access_token is required. Issue it in the LINE Developers console > Messaging API > Channel access token".to_string(),
        ));
    }

    if line.channel_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "line.channel_secret is required. Find it in the LINE Developers console > Basic settings > Channel secret".to_string(),
        ));
    }

    let base_url = line.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "line.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_admin(admin: &AdminConfig) -> Result<(), ConfigError> {
    if admin.username.trim().is_empty() {
        return Err(ConfigError::Validation("admin.username is required".to_string()));
    }
    if admin.username.contains(':') {
        return Err(ConfigError::Validation(
            "admin.username must not contain `:` (HTTP basic credentials separator)".to_string(),
        ));
    }
    if admin.password.expose_secret().is_empty() {
        return Err(ConfigError::Validation("admin.password is required".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address is required".to_string()));
    }

    Ok(())
}

fn validate_export(export: &ExportConfig) -> Result<(), ConfigError> {
    if export.path.file_name().is_none() {
        return Err(ConfigError::Validation(
            "export.path must point to a file (e.g. `nicknames.xlsx`)".to_string(),
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    line: Option<LinePatch>,
    admin: Option<AdminPatch>,
    server: Option<ServerPatch>,
    guard: Option<GuardPatch>,
    export: Option<ExportPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LinePatch {
    channel_access_token: Option<String>,
    channel_secret: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminPatch {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct GuardPatch {
    allowed_groups: Option<Vec<String>>,
    welcome_on_join: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
