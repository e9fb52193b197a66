use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use ubermelon_core::config::{resolve_config_path, AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
    ];

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["UBERMELON_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["UBERMELON_SERVER_PORT"]),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        source("server.health_check_port", &["UBERMELON_SERVER_HEALTH_CHECK_PORT"]),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", &["UBERMELON_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ));

    lines.push(render_line(
        "session.cookie_name",
        &config.session.cookie_name,
        source("session.cookie_name", &["UBERMELON_SESSION_COOKIE_NAME"]),
    ));
    let secret = match &config.session.secret {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset, random per process>".to_string(),
    };
    lines.push(render_line(
        "session.secret",
        &secret,
        source("session.secret", &["UBERMELON_SESSION_SECRET"]),
    ));
    lines.push(render_line(
        "session.idle_timeout_secs",
        &config.session.idle_timeout_secs.to_string(),
        source("session.idle_timeout_secs", &["UBERMELON_SESSION_IDLE_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "session.max_sessions",
        &config.session.max_sessions.to_string(),
        source("session.max_sessions", &["UBERMELON_SESSION_MAX_SESSIONS"]),
    ));

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());
    lines.push(render_line(
        "catalog.path",
        &catalog_path,
        source("catalog.path", &["UBERMELON_CATALOG_PATH"]),
    ));

    lines.push(render_line(
        "templates.dir",
        &config.templates.dir.display().to_string(),
        source("templates.dir", &["UBERMELON_TEMPLATES_DIR"]),
    ));
    lines.push(render_line(
        "templates.static_dir",
        &config.templates.static_dir.display().to_string(),
        source("templates.static_dir", &["UBERMELON_TEMPLATES_STATIC_DIR"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["UBERMELON_LOGGING_LEVEL", "UBERMELON_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["UBERMELON_LOGGING_FORMAT", "UBERMELON_LOG_FORMAT"]),
    ));

    lines.join("\n")
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
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
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

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        return "<empty>".to_string();
    }
    format!("<redacted, {} chars>", secret.chars().count())
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: Value = "[session]\ncookie_name = \"melon\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "session.cookie_name"));
        assert!(!contains_path(&doc, "session.secret"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn redact_secret_never_echoes_the_value() {
        let redacted = redact_secret("a-very-secret-session-key");

        assert!(!redacted.contains("secret-session"));
        assert_eq!(redacted, "<redacted, 25 chars>");
        assert_eq!(redact_secret("   "), "<empty>");
    }
}
