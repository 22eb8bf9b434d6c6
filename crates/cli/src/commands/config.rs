use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use nickbook_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

struct Sources {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl Sources {
    fn detect(explicit_path: Option<&Path>) -> Self {
        let file_path = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => [PathBuf::from("nickbook.toml"), PathBuf::from("config/nickbook.toml")]
                .into_iter()
                .find(|path| path.exists()),
        };
        let file_doc = file_path.as_deref().and_then(load_config_file_doc);
        Self { file_path, file_doc }
    }

    /// Env vars win over the file, which wins over defaults. Overrides never apply here.
    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run(options: LoadOptions) -> CommandResult {
    let sources = Sources::detect(options.config_path.as_deref());
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    CommandResult::success(COMMAND, render(&config, &sources))
}

fn render(config: &AppConfig, sources: &Sources) -> String {
    let allowed_groups = if config.guard.allowed_groups.is_empty() {
        "<none>".to_string()
    } else {
        config.guard.allowed_groups.join(",")
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        lines.push(format!("- {key} = {value} (source: {})", sources.source_of(key, env_keys)));
    };

    push("database.url", config.database.url.clone(), &["NICKBOOK_DATABASE_URL"]);
    push(
        "database.max_connections",
        config.database.max_connections.to_string(),
        &["NICKBOOK_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        config.database.timeout_secs.to_string(),
        &["NICKBOOK_DATABASE_TIMEOUT_SECS"],
    );
    push(
        "line.channel_access_token",
        redact_secret(&config.line.channel_access_token),
        &["NICKBOOK_LINE_CHANNEL_ACCESS_TOKEN", "CHANNEL_ACCESS_TOKEN"],
    );
    push(
        "line.channel_secret",
        redact_secret(&config.line.channel_secret),
        &["NICKBOOK_LINE_CHANNEL_SECRET", "CHANNEL_SECRET"],
    );
    push("line.api_base_url", config.line.api_base_url.clone(), &["NICKBOOK_LINE_API_BASE_URL"]);
    push(
        "admin.username",
        config.admin.username.clone(),
        &["NICKBOOK_ADMIN_USERNAME", "ADMIN_USERNAME"],
    );
    push(
        "admin.password",
        redact_secret(&config.admin.password),
        &["NICKBOOK_ADMIN_PASSWORD", "ADMIN_PASSWORD"],
    );
    push(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["NICKBOOK_SERVER_BIND_ADDRESS"],
    );
    push("server.port", config.server.port.to_string(), &["NICKBOOK_SERVER_PORT", "PORT"]);
    push("guard.allowed_groups", allowed_groups, &["NICKBOOK_ALLOWED_GROUPS"]);
    push(
        "guard.welcome_on_join",
        config.guard.welcome_on_join.to_string(),
        &["NICKBOOK_WELCOME_ON_JOIN"],
    );
    push("export.path", config.export.path.display().to_string(), &["NICKBOOK_EXPORT_PATH"]);
    push(
        "logging.level",
        config.logging.level.clone(),
        &["NICKBOOK_LOGGING_LEVEL", "NICKBOOK_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format).to_lowercase(),
        &["NICKBOOK_LOGGING_FORMAT", "NICKBOOK_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
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

fn redact_secret(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
