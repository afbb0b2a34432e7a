use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Process-wide configuration, read once at startup and passed explicitly to
/// the orchestrator and the webhook dispatcher so tests can inject fixtures.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub vapi: VapiConfig,
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout_ms: u32,
}

/// Credentials and identifiers for the call platform.
#[derive(Clone, Debug)]
pub struct VapiConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// Platform phone number id that Agent A dials out from.
    pub phone_number_id: Option<String>,
    /// The number Agent B (or the human) answers on.
    pub customer_number: Option<String>,
    pub assistant_a_id: Option<String>,
    pub assistant_b_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub call_mode: CallMode,
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Fixed pause between sequential outbound calls.
    pub delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Which end-of-call pipeline the webhook receiver runs: two AI agents
/// talking to each other, or one AI agent talking to a human caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    TwoAgent,
    Human,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
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
    pub vapi_api_key: Option<String>,
    pub vapi_base_url: Option<String>,
    pub phone_number_id: Option<String>,
    pub customer_number: Option<String>,
    pub assistant_a_id: Option<String>,
    pub assistant_b_id: Option<String>,
    pub call_mode: Option<CallMode>,
    pub delay_ms: Option<u64>,
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
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for VapiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new().into(),
            base_url: "https://api.vapi.ai".to_string(),
            phone_number_id: None,
            customer_number: None,
            assistant_a_id: None,
            assistant_b_id: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://crosstalk.db".to_string(),
            max_connections: 5,
            timeout_secs: 30,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            vapi: VapiConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                call_mode: CallMode::TwoAgent,
            },
            orchestrator: OrchestratorConfig { delay_ms: 10_000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for CallMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "two_agent" | "two-agent" => Ok(Self::TwoAgent),
            "human" => Ok(Self::Human),
            other => Err(ConfigError::Validation(format!(
                "unsupported call mode `{other}` (expected two_agent|human)"
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

impl VapiConfig {
    /// Outbound calling needs the full credential set. Returns every missing
    /// key at once so an operator can fix the environment in one pass.
    pub fn require_outbound(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.api_key.expose_secret().is_empty() {
            missing.push("VAPI_API_KEY");
        }
        if self.phone_number_id.as_deref().unwrap_or("").is_empty() {
            missing.push("PHONE_A_ID");
        }
        if self.customer_number.as_deref().unwrap_or("").is_empty() {
            missing.push("PHONE_B_NUMBER");
        }
        if self.assistant_a_id.as_deref().unwrap_or("").is_empty() {
            missing.push("ASSISTANT_A_ID");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(format!(
                "missing required call platform settings: {}",
                missing.join(", ")
            )))
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("crosstalk.toml"));
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
            if let Some(busy_timeout_ms) = database.busy_timeout_ms {
                self.database.busy_timeout_ms = busy_timeout_ms;
            }
        }

        if let Some(vapi) = patch.vapi {
            if let Some(api_key) = vapi.api_key {
                self.vapi.api_key = api_key.into();
            }
            if let Some(base_url) = vapi.base_url {
                self.vapi.base_url = base_url;
            }
            if let Some(phone_number_id) = vapi.phone_number_id {
                self.vapi.phone_number_id = Some(phone_number_id);
            }
            if let Some(customer_number) = vapi.customer_number {
                self.vapi.customer_number = Some(customer_number);
            }
            if let Some(assistant_a_id) = vapi.assistant_a_id {
                self.vapi.assistant_a_id = Some(assistant_a_id);
            }
            if let Some(assistant_b_id) = vapi.assistant_b_id {
                self.vapi.assistant_b_id = Some(assistant_b_id);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(call_mode) = server.call_mode {
                self.server.call_mode = call_mode;
            }
        }

        if let Some(orchestrator) = patch.orchestrator {
            if let Some(delay_ms) = orchestrator.delay_ms {
                self.orchestrator.delay_ms = delay_ms;
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
        if let Some(url) = read_env("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(api_key) = read_env("VAPI_API_KEY") {
            self.vapi.api_key = api_key.into();
        }
        if let Some(base_url) = read_env("VAPI_BASE_URL") {
            self.vapi.base_url = base_url;
        }
        if let Some(phone_number_id) = read_env("PHONE_A_ID") {
            self.vapi.phone_number_id = Some(phone_number_id);
        }
        if let Some(customer_number) = read_env("PHONE_B_NUMBER") {
            self.vapi.customer_number = Some(customer_number);
        }
        if let Some(assistant_a_id) = read_env("ASSISTANT_A_ID") {
            self.vapi.assistant_a_id = Some(assistant_a_id);
        }
        if let Some(assistant_b_id) = read_env("ASSISTANT_B_ID") {
            self.vapi.assistant_b_id = Some(assistant_b_id);
        }
        if let Some(port) = read_env("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(bind_address) = read_env("CROSSTALK_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        if let Some(call_mode) = read_env("CROSSTALK_CALL_MODE") {
            self.server.call_mode = call_mode.parse()?;
        }
        if let Some(delay_ms) = read_env("CROSSTALK_DELAY_MS") {
            self.orchestrator.delay_ms = parse_env("CROSSTALK_DELAY_MS", &delay_ms)?;
        }
        if let Some(level) = read_env("CROSSTALK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = read_env("CROSSTALK_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(api_key) = overrides.vapi_api_key {
            self.vapi.api_key = api_key.into();
        }
        if let Some(base_url) = overrides.vapi_base_url {
            self.vapi.base_url = base_url;
        }
        if let Some(phone_number_id) = overrides.phone_number_id {
            self.vapi.phone_number_id = Some(phone_number_id);
        }
        if let Some(customer_number) = overrides.customer_number {
            self.vapi.customer_number = Some(customer_number);
        }
        if let Some(assistant_a_id) = overrides.assistant_a_id {
            self.vapi.assistant_a_id = Some(assistant_a_id);
        }
        if let Some(assistant_b_id) = overrides.assistant_b_id {
            self.vapi.assistant_b_id = Some(assistant_b_id);
        }
        if let Some(call_mode) = overrides.call_mode {
            self.server.call_mode = call_mode;
        }
        if let Some(delay_ms) = overrides.delay_ms {
            self.orchestrator.delay_ms = delay_ms;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.vapi.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("vapi.base_url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("crosstalk.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    vapi: Option<VapiPatch>,
    server: Option<ServerPatch>,
    orchestrator: Option<OrchestratorPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    busy_timeout_ms: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct VapiPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    phone_number_id: Option<String>,
    customer_number: Option<String>,
    assistant_a_id: Option<String>,
    assistant_b_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    call_mode: Option<CallMode>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestratorPatch {
    delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
