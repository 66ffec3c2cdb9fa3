use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub dialog: DialogConfig,
    pub orchestrator: OrchestratorConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    /// Classifications below this confidence are forced to UNKNOWN and
    /// routed to clarification.
    pub confidence_threshold: f32,
}

#[derive(Clone, Debug)]
pub struct DialogConfig {
    /// Conversation state untouched for longer than this is treated as
    /// absent on the next read and removed.
    pub idle_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Hard per-capability-call timeout; a timeout reports as Unavailable.
    pub call_timeout_secs: u64,
    pub retry_base_ms: u64,
    pub retry_factor: u32,
    pub retry_max_attempts: u32,
}

impl OrchestratorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

impl DialogConfig {
    pub fn idle_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_timeout_secs as i64)
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
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
    pub confidence_threshold: Option<f32>,
    pub idle_timeout_secs: Option<u64>,
    pub call_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
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
            classifier: ClassifierConfig { confidence_threshold: 0.5 },
            dialog: DialogConfig { idle_timeout_secs: 1800 },
            orchestrator: OrchestratorConfig {
                call_timeout_secs: 10,
                retry_base_ms: 250,
                retry_factor: 2,
                retry_max_attempts: 2,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("hrdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(classifier) = patch.classifier {
            if let Some(confidence_threshold) = classifier.confidence_threshold {
                self.classifier.confidence_threshold = confidence_threshold;
            }
        }

        if let Some(dialog) = patch.dialog {
            if let Some(idle_timeout_secs) = dialog.idle_timeout_secs {
                self.dialog.idle_timeout_secs = idle_timeout_secs;
            }
        }

        if let Some(orchestrator) = patch.orchestrator {
            if let Some(call_timeout_secs) = orchestrator.call_timeout_secs {
                self.orchestrator.call_timeout_secs = call_timeout_secs;
            }
            if let Some(retry_base_ms) = orchestrator.retry_base_ms {
                self.orchestrator.retry_base_ms = retry_base_ms;
            }
            if let Some(retry_factor) = orchestrator.retry_factor {
                self.orchestrator.retry_factor = retry_factor;
            }
            if let Some(retry_max_attempts) = orchestrator.retry_max_attempts {
                self.orchestrator.retry_max_attempts = retry_max_attempts;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(api_key_value.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
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
        if let Some(value) = read_env("HRDESK_CLASSIFIER_CONFIDENCE_THRESHOLD") {
            self.classifier.confidence_threshold =
                parse_f32("HRDESK_CLASSIFIER_CONFIDENCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("HRDESK_DIALOG_IDLE_TIMEOUT_SECS") {
            self.dialog.idle_timeout_secs = parse_u64("HRDESK_DIALOG_IDLE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HRDESK_ORCHESTRATOR_CALL_TIMEOUT_SECS") {
            self.orchestrator.call_timeout_secs =
                parse_u64("HRDESK_ORCHESTRATOR_CALL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HRDESK_ORCHESTRATOR_RETRY_BASE_MS") {
            self.orchestrator.retry_base_ms =
                parse_u64("HRDESK_ORCHESTRATOR_RETRY_BASE_MS", &value)?;
        }
        if let Some(value) = read_env("HRDESK_ORCHESTRATOR_RETRY_FACTOR") {
            self.orchestrator.retry_factor = parse_u32("HRDESK_ORCHESTRATOR_RETRY_FACTOR", &value)?;
        }
        if let Some(value) = read_env("HRDESK_ORCHESTRATOR_RETRY_MAX_ATTEMPTS") {
            self.orchestrator.retry_max_attempts =
                parse_u32("HRDESK_ORCHESTRATOR_RETRY_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("HRDESK_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("HRDESK_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("HRDESK_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("HRDESK_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HRDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("HRDESK_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HRDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HRDESK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("HRDESK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("HRDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HRDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("HRDESK_LOGGING_LEVEL").or_else(|| read_env("HRDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HRDESK_LOGGING_FORMAT").or_else(|| read_env("HRDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(confidence_threshold) = overrides.confidence_threshold {
            self.classifier.confidence_threshold = confidence_threshold;
        }
        if let Some(idle_timeout_secs) = overrides.idle_timeout_secs {
            self.dialog.idle_timeout_secs = idle_timeout_secs;
        }
        if let Some(call_timeout_secs) = overrides.call_timeout_secs {
            self.orchestrator.call_timeout_secs = call_timeout_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(llm_api_key.into());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_classifier(&self.classifier)?;
        validate_dialog(&self.dialog)?;
        validate_orchestrator(&self.orchestrator)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("hrdesk.toml"), PathBuf::from("config/hrdesk.toml")]
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

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&classifier.confidence_threshold) {
        return Err(ConfigError::Validation(
            "classifier.confidence_threshold must be within [0.0, 1.0]".to_string(),
        ));
    }
    Ok(())
}

fn validate_dialog(dialog: &DialogConfig) -> Result<(), ConfigError> {
    if dialog.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "dialog.idle_timeout_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_orchestrator(orchestrator: &OrchestratorConfig) -> Result<(), ConfigError> {
    if orchestrator.call_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "orchestrator.call_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if orchestrator.retry_factor == 0 {
        return Err(ConfigError::Validation(
            "orchestrator.retry_factor must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.provider == LlmProvider::Ollama && llm.base_url.is_none() {
        return Err(ConfigError::Validation(
            "llm.base_url is required for the ollama provider".to_string(),
        ));
    }
    if llm.provider != LlmProvider::Ollama && llm.api_key.is_none() {
        return Err(ConfigError::Validation(
            "llm.api_key is required for hosted llm providers".to_string(),
        ));
    }
    if llm.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let valid_level = matches!(
        logging.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    );
    if !valid_level {
        return Err(ConfigError::Validation(format!(
            "logging.level `{}` is not one of trace|debug|info|warn|error",
            logging.level
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    classifier: Option<ClassifierPatch>,
    dialog: Option<DialogPatch>,
    orchestrator: Option<OrchestratorPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct ClassifierPatch {
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct DialogPatch {
    idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OrchestratorPatch {
    call_timeout_secs: Option<u64>,
    retry_base_ms: Option<u64>,
    retry_factor: Option<u32>,
    retry_max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
