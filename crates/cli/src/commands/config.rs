use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hrdesk_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let entries: Vec<(&str, String, &str)> = vec![
        (
            "classifier.confidence_threshold",
            config.classifier.confidence_threshold.to_string(),
            "HRDESK_CLASSIFIER_CONFIDENCE_THRESHOLD",
        ),
        (
            "dialog.idle_timeout_secs",
            config.dialog.idle_timeout_secs.to_string(),
            "HRDESK_DIALOG_IDLE_TIMEOUT_SECS",
        ),
        (
            "orchestrator.call_timeout_secs",
            config.orchestrator.call_timeout_secs.to_string(),
            "HRDESK_ORCHESTRATOR_CALL_TIMEOUT_SECS",
        ),
        (
            "orchestrator.retry_base_ms",
            config.orchestrator.retry_base_ms.to_string(),
            "HRDESK_ORCHESTRATOR_RETRY_BASE_MS",
        ),
        (
            "orchestrator.retry_max_attempts",
            config.orchestrator.retry_max_attempts.to_string(),
            "HRDESK_ORCHESTRATOR_RETRY_MAX_ATTEMPTS",
        ),
        ("llm.provider", format!("{:?}", config.llm.provider), "HRDESK_LLM_PROVIDER"),
        ("llm.model", config.llm.model.clone(), "HRDESK_LLM_MODEL"),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "HRDESK_LLM_BASE_URL",
        ),
        ("llm.api_key", api_key.to_string(), "HRDESK_LLM_API_KEY"),
        ("server.bind_address", config.server.bind_address.clone(), "HRDESK_SERVER_BIND_ADDRESS"),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            "HRDESK_SERVER_HEALTH_CHECK_PORT",
        ),
        ("logging.level", config.logging.level.clone(), "HRDESK_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "HRDESK_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        let source = field_source(
            key,
            Some(env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {key} = {value} (source: {source})"));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("hrdesk.toml"), PathBuf::from("config/hrdesk.toml")]
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
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: toml::Value =
            "[llm]\nmodel = \"phi3\"\n[logging]\nlevel = \"debug\"".parse().expect("valid toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(contains_path(&doc, "logging.level"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.bind_address"));
    }
}
