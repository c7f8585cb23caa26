use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_PRICING_SERVER: &str = "awslabs.aws-pricing-mcp-server@latest";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cloud: CloudConfig,
    pub model: ModelConfig,
    pub sandbox: SandboxConfig,
    pub pricing: PricingConfig,
    pub slack: SlackConfig,
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CloudConfig {
    pub region: String,
    pub profile: String,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct SandboxConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub enabled: bool,
    pub app_token: SecretString,
    pub bot_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub url: Option<String>,
    pub bearer_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
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
    pub region: Option<String>,
    pub profile: Option<String>,
    pub log_level: Option<String>,
    pub model_provider: Option<ModelProvider>,
    pub model_name: Option<String>,
    pub model_api_key: Option<String>,
    pub sandbox_endpoint: Option<String>,
    pub slack_enabled: Option<bool>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub runtime_url: Option<String>,
    pub runtime_bearer_token: Option<String>,
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
            cloud: CloudConfig {
                region: DEFAULT_REGION.to_string(),
                profile: DEFAULT_PROFILE.to_string(),
            },
            model: ModelConfig {
                provider: ModelProvider::Anthropic,
                api_key: None,
                base_url: None,
                model: DEFAULT_MODEL.to_string(),
                max_tokens: 4096,
                timeout_secs: 120,
                max_tool_rounds: 25,
            },
            sandbox: SandboxConfig { endpoint: None, api_key: None, timeout_secs: 60 },
            pricing: PricingConfig {
                command: "uvx".to_string(),
                args: vec![DEFAULT_PRICING_SERVER.to_string()],
            },
            slack: SlackConfig {
                enabled: false,
                app_token: String::new().into(),
                bot_token: String::new().into(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            runtime: RuntimeConfig { url: None, bearer_token: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported model provider `{other}` (expected anthropic|openai|ollama)"
            ))),
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
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
        let config = Self::resolve(options)?;
        config.validate()?;
        Ok(config)
    }

    /// Layers defaults, file, env and overrides without validating the result.
    /// For callers that only need one section, such as a remote runtime client.
    pub fn resolve(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cloudcost.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);

        Ok(config)
    }

    /// Base URL for the configured model provider, falling back to the provider default.
    pub fn model_base_url(&self) -> &str {
        self.model.base_url.as_deref().unwrap_or_else(|| self.model.provider.default_base_url())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(cloud) = patch.cloud {
            if let Some(region) = cloud.region {
                self.cloud.region = region;
            }
            if let Some(profile) = cloud.profile {
                self.cloud.profile = profile;
            }
        }

        if let Some(model) = patch.model {
            if let Some(provider) = model.provider {
                self.model.provider = provider;
            }
            if let Some(model_api_key_value) = model.api_key {
                self.model.api_key = Some(secret_value(model_api_key_value));
            }
            if let Some(base_url) = model.base_url {
                self.model.base_url = Some(base_url);
            }
            if let Some(name) = model.model {
                self.model.model = name;
            }
            if let Some(max_tokens) = model.max_tokens {
                self.model.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = model.timeout_secs {
                self.model.timeout_secs = timeout_secs;
            }
            if let Some(max_tool_rounds) = model.max_tool_rounds {
                self.model.max_tool_rounds = max_tool_rounds;
            }
        }

        if let Some(sandbox) = patch.sandbox {
            if let Some(endpoint) = sandbox.endpoint {
                self.sandbox.endpoint = Some(endpoint);
            }
            if let Some(sandbox_api_key_value) = sandbox.api_key {
                self.sandbox.api_key = Some(secret_value(sandbox_api_key_value));
            }
            if let Some(timeout_secs) = sandbox.timeout_secs {
                self.sandbox.timeout_secs = timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(command) = pricing.command {
                self.pricing.command = command;
            }
            if let Some(args) = pricing.args {
                self.pricing.args = args;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(enabled) = slack.enabled {
                self.slack.enabled = enabled;
            }
            if let Some(slack_app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(slack_app_token_value);
            }
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(runtime) = patch.runtime {
            if let Some(url) = runtime.url {
                self.runtime.url = Some(url);
            }
            if let Some(bearer_token_value) = runtime.bearer_token {
                self.runtime.bearer_token = Some(secret_value(bearer_token_value));
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
        let region = read_env("CLOUDCOST_CLOUD_REGION").or_else(|| read_env("AWS_REGION"));
        if let Some(value) = region {
            self.cloud.region = value;
        }
        let profile = read_env("CLOUDCOST_CLOUD_PROFILE").or_else(|| read_env("AWS_PROFILE"));
        if let Some(value) = profile {
            self.cloud.profile = value;
        }

        if let Some(value) = read_env("CLOUDCOST_MODEL_PROVIDER") {
            self.model.provider = value.parse()?;
        }
        if let Some(value) = read_env("CLOUDCOST_MODEL_API_KEY") {
            self.model.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CLOUDCOST_MODEL_BASE_URL") {
            self.model.base_url = Some(value);
        }
        if let Some(value) = read_env("CLOUDCOST_MODEL_NAME") {
            self.model.model = value;
        }
        if let Some(value) = read_env("CLOUDCOST_MODEL_MAX_TOKENS") {
            self.model.max_tokens = parse_u32("CLOUDCOST_MODEL_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("CLOUDCOST_MODEL_TIMEOUT_SECS") {
            self.model.timeout_secs = parse_u64("CLOUDCOST_MODEL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CLOUDCOST_MODEL_MAX_TOOL_ROUNDS") {
            self.model.max_tool_rounds = parse_u32("CLOUDCOST_MODEL_MAX_TOOL_ROUNDS", &value)?;
        }

        if let Some(value) = read_env("CLOUDCOST_SANDBOX_ENDPOINT") {
            self.sandbox.endpoint = Some(value);
        }
        if let Some(value) = read_env("CLOUDCOST_SANDBOX_API_KEY") {
            self.sandbox.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CLOUDCOST_SANDBOX_TIMEOUT_SECS") {
            self.sandbox.timeout_secs = parse_u64("CLOUDCOST_SANDBOX_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CLOUDCOST_PRICING_COMMAND") {
            self.pricing.command = value;
        }
        if let Some(value) = read_env("CLOUDCOST_PRICING_ARGS") {
            self.pricing.args = value.split_whitespace().map(str::to_owned).collect();
        }

        if let Some(value) = read_env("CLOUDCOST_SLACK_ENABLED") {
            self.slack.enabled = parse_bool("CLOUDCOST_SLACK_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CLOUDCOST_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("CLOUDCOST_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }

        if let Some(value) = read_env("CLOUDCOST_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CLOUDCOST_SERVER_PORT") {
            self.server.port = parse_u16("CLOUDCOST_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CLOUDCOST_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CLOUDCOST_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CLOUDCOST_RUNTIME_URL") {
            self.runtime.url = Some(value);
        }
        if let Some(value) = read_env("CLOUDCOST_RUNTIME_BEARER_TOKEN") {
            self.runtime.bearer_token = Some(secret_value(value));
        }

        let log_level =
            read_env("CLOUDCOST_LOGGING_LEVEL").or_else(|| read_env("CLOUDCOST_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CLOUDCOST_LOGGING_FORMAT").or_else(|| read_env("CLOUDCOST_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(region) = overrides.region {
            self.cloud.region = region;
        }
        if let Some(profile) = overrides.profile {
            self.cloud.profile = profile;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.model_provider {
            self.model.provider = provider;
        }
        if let Some(model_name) = overrides.model_name {
            self.model.model = model_name;
        }
        if let Some(model_api_key) = overrides.model_api_key {
            self.model.api_key = Some(secret_value(model_api_key));
        }
        if let Some(sandbox_endpoint) = overrides.sandbox_endpoint {
            self.sandbox.endpoint = Some(sandbox_endpoint);
        }
        if let Some(enabled) = overrides.slack_enabled {
            self.slack.enabled = enabled;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(runtime_url) = overrides.runtime_url {
            self.runtime.url = Some(runtime_url);
        }
        if let Some(bearer_token) = overrides.runtime_bearer_token {
            self.runtime.bearer_token = Some(secret_value(bearer_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_cloud(&self.cloud)?;
        validate_model(&self.model)?;
        validate_sandbox(&self.sandbox)?;
        validate_pricing(&self.pricing)?;
        validate_slack(&self.slack)?;
        validate_server(&self.server)?;
        validate_runtime(&self.runtime)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cloudcost.toml"), PathBuf::from("config/cloudcost.toml")]
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

fn validate_cloud(cloud: &CloudConfig) -> Result<(), ConfigError> {
    if cloud.region.trim().is_empty() {
        return Err(ConfigError::Validation("cloud.region must not be empty".to_string()));
    }
    if cloud.profile.trim().is_empty() {
        return Err(ConfigError::Validation("cloud.profile must not be empty".to_string()));
    }
    Ok(())
}

fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    if model.model.trim().is_empty() {
        return Err(ConfigError::Validation("model.model must not be empty".to_string()));
    }

    if model.timeout_secs == 0 || model.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "model.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if model.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "model.max_tokens must be greater than zero".to_string(),
        ));
    }

    if model.max_tool_rounds == 0 {
        return Err(ConfigError::Validation(
            "model.max_tool_rounds must be greater than zero".to_string(),
        ));
    }

    if let Some(base_url) = &model.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "model.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    match model.provider {
        ModelProvider::Anthropic | ModelProvider::OpenAi => {
            let missing = model
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "model.api_key is required for anthropic/openai providers (set CLOUDCOST_MODEL_API_KEY)"
                        .to_string(),
                ));
            }
        }
        ModelProvider::Ollama => {}
    }

    Ok(())
}

fn validate_sandbox(sandbox: &SandboxConfig) -> Result<(), ConfigError> {
    let Some(endpoint) = sandbox.endpoint.as_deref().map(str::trim) else {
        return Err(ConfigError::Validation(
            "sandbox.endpoint is required (set CLOUDCOST_SANDBOX_ENDPOINT to the code interpreter API)"
                .to_string(),
        ));
    };

    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "sandbox.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if sandbox.timeout_secs == 0 || sandbox.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "sandbox.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.command.trim().is_empty() {
        return Err(ConfigError::Validation("pricing.command must not be empty".to_string()));
    }
    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if !slack.enabled {
        return Ok(());
    }

    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required when slack.enabled is true. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required when slack.enabled is true. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_runtime(runtime: &RuntimeConfig) -> Result<(), ConfigError> {
    if let Some(url) = &runtime.url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "runtime.url must start with http:// or https://".to_string(),
            ));
        }
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
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    cloud: Option<CloudPatch>,
    model: Option<ModelPatch>,
    sandbox: Option<SandboxPatch>,
    pricing: Option<PricingPatch>,
    slack: Option<SlackPatch>,
    server: Option<ServerPatch>,
    runtime: Option<RuntimePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudPatch {
    region: Option<String>,
    profile: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelPatch {
    provider: Option<ModelProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SandboxPatch {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    command: Option<String>,
    args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    enabled: Option<bool>,
    app_token: Option<String>,
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RuntimePatch {
    url: Option<String>,
    bearer_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
