use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cloudcost_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One reported key: its dotted path, rendered value and the env keys that feed it,
/// in lookup order.
struct ConfigField {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    // Resolution without validation lets operators inspect a half-finished setup.
    let config = match AppConfig::resolve(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config resolution failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    if let Err(error) = config.validate() {
        lines.push(format!("validation: {error}"));
    } else {
        lines.push("validation: ok".to_string());
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<ConfigField> {
    vec![
        ConfigField {
            key_path: "cloud.region",
            value: config.cloud.region.clone(),
            env_keys: &["CLOUDCOST_CLOUD_REGION", "AWS_REGION"],
        },
        ConfigField {
            key_path: "cloud.profile",
            value: config.cloud.profile.clone(),
            env_keys: &["CLOUDCOST_CLOUD_PROFILE", "AWS_PROFILE"],
        },
        ConfigField {
            key_path: "model.provider",
            value: config.model.provider.to_string(),
            env_keys: &["CLOUDCOST_MODEL_PROVIDER"],
        },
        ConfigField {
            key_path: "model.model",
            value: config.model.model.clone(),
            env_keys: &["CLOUDCOST_MODEL_NAME"],
        },
        ConfigField {
            key_path: "model.base_url",
            value: config.model_base_url().to_string(),
            env_keys: &["CLOUDCOST_MODEL_BASE_URL"],
        },
        ConfigField {
            key_path: "model.api_key",
            value: redact_optional(config.model.api_key.as_ref()),
            env_keys: &["CLOUDCOST_MODEL_API_KEY"],
        },
        ConfigField {
            key_path: "model.max_tool_rounds",
            value: config.model.max_tool_rounds.to_string(),
            env_keys: &["CLOUDCOST_MODEL_MAX_TOOL_ROUNDS"],
        },
        ConfigField {
            key_path: "sandbox.endpoint",
            value: config.sandbox.endpoint.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["CLOUDCOST_SANDBOX_ENDPOINT"],
        },
        ConfigField {
            key_path: "sandbox.api_key",
            value: redact_optional(config.sandbox.api_key.as_ref()),
            env_keys: &["CLOUDCOST_SANDBOX_API_KEY"],
        },
        ConfigField {
            key_path: "sandbox.timeout_secs",
            value: config.sandbox.timeout_secs.to_string(),
            env_keys: &["CLOUDCOST_SANDBOX_TIMEOUT_SECS"],
        },
        ConfigField {
            key_path: "pricing.command",
            value: std::iter::once(config.pricing.command.as_str())
                .chain(config.pricing.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            env_keys: &["CLOUDCOST_PRICING_COMMAND"],
        },
        ConfigField {
            key_path: "slack.enabled",
            value: config.slack.enabled.to_string(),
            env_keys: &["CLOUDCOST_SLACK_ENABLED"],
        },
        ConfigField {
            key_path: "slack.app_token",
            value: redact_token(config.slack.app_token.expose_secret()),
            env_keys: &["CLOUDCOST_SLACK_APP_TOKEN"],
        },
        ConfigField {
            key_path: "slack.bot_token",
            value: redact_token(config.slack.bot_token.expose_secret()),
            env_keys: &["CLOUDCOST_SLACK_BOT_TOKEN"],
        },
        ConfigField {
            key_path: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["CLOUDCOST_SERVER_BIND_ADDRESS"],
        },
        ConfigField {
            key_path: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["CLOUDCOST_SERVER_PORT"],
        },
        ConfigField {
            key_path: "runtime.url",
            value: config.runtime.url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["CLOUDCOST_RUNTIME_URL"],
        },
        ConfigField {
            key_path: "runtime.bearer_token",
            value: redact_optional(config.runtime.bearer_token.as_ref()),
            env_keys: &["CLOUDCOST_RUNTIME_BEARER_TOKEN"],
        },
        ConfigField {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["CLOUDCOST_LOGGING_LEVEL", "CLOUDCOST_LOG_LEVEL"],
        },
        ConfigField {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_keys: &["CLOUDCOST_LOGGING_FORMAT", "CLOUDCOST_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("cloudcost.toml"), PathBuf::from("config/cloudcost.toml")]
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    match secret {
        Some(value) if !value.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        _ => "<unset>".to_string(),
    }
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
