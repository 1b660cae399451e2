use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for a permitting and licensing office. \
Use the available tools to look up records, applicants, locations and record types for the user's community. \
When a tool returns records, summarise what you found in plain language; an interactive view is shown alongside \
your answer.";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub record_api: RecordApiConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct RecordApiConfig {
    pub url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub protocol_version: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub max_tool_rounds: usize,
    pub enrichment_record_limit: usize,
    pub default_community: Option<String>,
    /// Ask the model for suggested next prompts after each final answer.
    pub follow_up_actions: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
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
    pub record_api_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub default_community: Option<String>,
    pub port: Option<u16>,
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
            record_api: RecordApiConfig {
                url: String::new(),
                api_key: None,
                timeout_secs: 30,
                protocol_version: "2025-03-26".to_string(),
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434/v1".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 60,
                temperature: 0.1,
            },
            agent: AgentConfig {
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
                max_tool_rounds: 8,
                enrichment_record_limit: 5,
                default_community: None,
                follow_up_actions: true,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl RecordApiConfig {
    pub fn bearer_token(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret()).filter(|key| !key.trim().is_empty())
    }
}

impl LlmConfig {
    pub fn bearer_token(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret()).filter(|key| !key.trim().is_empty())
    }

    /// Chat-completions base URL for the configured provider.
    pub fn endpoint_base(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, LlmProvider::OpenAi) => "https://api.openai.com/v1",
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1",
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("permitdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(record_api) = patch.record_api {
            if let Some(url) = record_api.url {
                self.record_api.url = url;
            }
            if let Some(api_key) = record_api.api_key {
                self.record_api.api_key = Some(secret_value(api_key));
            }
            if let Some(timeout_secs) = record_api.timeout_secs {
                self.record_api.timeout_secs = timeout_secs;
            }
            if let Some(protocol_version) = record_api.protocol_version {
                self.record_api.protocol_version = protocol_version;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
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
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(system_prompt) = agent.system_prompt {
                self.agent.system_prompt = system_prompt;
            }
            if let Some(max_tool_rounds) = agent.max_tool_rounds {
                self.agent.max_tool_rounds = max_tool_rounds;
            }
            if let Some(limit) = agent.enrichment_record_limit {
                self.agent.enrichment_record_limit = limit;
            }
            if let Some(default_community) = agent.default_community {
                self.agent.default_community = Some(default_community);
            }
            if let Some(follow_up_actions) = agent.follow_up_actions {
                self.agent.follow_up_actions = follow_up_actions;
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
        if let Some(value) = read_env("PERMITDESK_RECORD_API_URL") {
            self.record_api.url = value;
        }
        if let Some(value) = read_env("PERMITDESK_RECORD_API_KEY") {
            self.record_api.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PERMITDESK_RECORD_API_TIMEOUT_SECS") {
            self.record_api.timeout_secs = parse_u64("PERMITDESK_RECORD_API_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PERMITDESK_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("PERMITDESK_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PERMITDESK_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PERMITDESK_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PERMITDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PERMITDESK_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("PERMITDESK_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("PERMITDESK_AGENT_SYSTEM_PROMPT") {
            self.agent.system_prompt = value;
        }
        if let Some(value) = read_env("PERMITDESK_AGENT_MAX_TOOL_ROUNDS") {
            self.agent.max_tool_rounds = parse_usize("PERMITDESK_AGENT_MAX_TOOL_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_AGENT_ENRICHMENT_RECORD_LIMIT") {
            self.agent.enrichment_record_limit =
                parse_usize("PERMITDESK_AGENT_ENRICHMENT_RECORD_LIMIT", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_AGENT_DEFAULT_COMMUNITY") {
            self.agent.default_community = Some(value);
        }
        if let Some(value) = read_env("PERMITDESK_AGENT_FOLLOW_UP_ACTIONS") {
            self.agent.follow_up_actions = parse_bool("PERMITDESK_AGENT_FOLLOW_UP_ACTIONS", &value)?;
        }

        if let Some(value) = read_env("PERMITDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PERMITDESK_SERVER_PORT") {
            self.server.port = parse_u16("PERMITDESK_SERVER_PORT", &value)?;
        }

        let log_level = read_env("PERMITDESK_LOGGING_LEVEL").or_else(|| read_env("PERMITDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("PERMITDESK_LOGGING_FORMAT").or_else(|| read_env("PERMITDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(record_api_url) = overrides.record_api_url {
            self.record_api.url = record_api_url;
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
        if let Some(default_community) = overrides.default_community {
            self.agent.default_community = Some(default_community);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_record_api(&self.record_api)?;
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("permitdesk.toml"), PathBuf::from("config/permitdesk.toml")]
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

            let value =
                env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_record_api(record_api: &RecordApiConfig) -> Result<(), ConfigError> {
    let url = record_api.url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(
            "record_api.url is required (set it in permitdesk.toml or PERMITDESK_RECORD_API_URL)".to_string(),
        ));
    }
    if !is_http_url(url) {
        return Err(ConfigError::Validation(
            "record_api.url must start with http:// or https://".to_string(),
        ));
    }

    if record_api.timeout_secs == 0 || record_api.timeout_secs > 300 {
        return Err(ConfigError::Validation("record_api.timeout_secs must be in range 1..=300".to_string()));
    }

    if record_api.protocol_version.trim().is_empty() {
        return Err(ConfigError::Validation("record_api.protocol_version must not be empty".to_string()));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation("llm.timeout_secs must be in range 1..=300".to_string()));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation("llm.temperature must be in range 0.0..=2.0".to_string()));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            if llm.bearer_token().is_none() {
                return Err(ConfigError::Validation("llm.api_key is required for the openai provider".to_string()));
            }
        }
        LlmProvider::Ollama => {
            let missing = llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation("llm.base_url is required for ollama provider".to_string()));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !is_http_url(base_url.trim()) {
            return Err(ConfigError::Validation("llm.base_url must start with http:// or https://".to_string()));
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_tool_rounds == 0 {
        return Err(ConfigError::Validation("agent.max_tool_rounds must be greater than zero".to_string()));
    }

    if agent.enrichment_record_limit == 0 {
        return Err(ConfigError::Validation(
            "agent.enrichment_record_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation("logging.level must be one of trace|debug|info|warn|error".to_string())),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_override(key, value)),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    record_api: Option<RecordApiPatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordApiPatch {
    url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    protocol_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    system_prompt: Option<String>,
    max_tool_rounds: Option<usize>,
    enrichment_record_limit: Option<usize>,
    default_community: Option<String>,
    follow_up_actions: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
