use std::env;
use std::sync::{Mutex, OnceLock};

use cloudcost_cli::commands::{config, doctor, estimate, invoke};
use serde_json::Value;

#[test]
fn estimate_returns_config_failure_without_sandbox_endpoint() {
    with_env(&[("CLOUDCOST_MODEL_PROVIDER", "ollama")], || {
        let result = estimate::run("two t3.medium instances");
        assert_eq!(result.exit_code, estimate::EXIT_CONFIG, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "estimate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(
            payload["message"].as_str().unwrap_or_default().contains("sandbox.endpoint"),
            "message should name the missing key"
        );
    });
}

#[test]
fn estimate_rejects_blank_description() {
    with_env(&[], || {
        let result = estimate::run("   ");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn invoke_requires_runtime_url() {
    with_env(&[("CLOUDCOST_RUNTIME_BEARER_TOKEN", "token")], || {
        let result = invoke::run("one lambda function", None, None);
        assert_eq!(result.exit_code, invoke::EXIT_CONFIG);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "invoke");
        assert!(payload["message"].as_str().unwrap_or_default().contains("--url"));
    });
}

#[test]
fn invoke_requires_bearer_token_even_with_url_flag() {
    with_env(&[], || {
        let result =
            invoke::run("one lambda function", Some("https://runtime.invalid/invocations".into()), None);
        assert_eq!(result.exit_code, invoke::EXIT_CONFIG);

        let payload = parse_payload(&result.output);
        assert!(payload["message"].as_str().unwrap_or_default().contains("--token"));
    });
}

#[test]
fn doctor_reports_every_missing_component() {
    with_env(&[("CLOUDCOST_PRICING_COMMAND", "cloudcost-no-such-binary")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, doctor::EXIT_NOT_READY);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");

        let checks = payload["checks"].as_array().expect("checks array");
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "fail");
        assert_eq!(status_of("model_credentials"), "fail");
        assert_eq!(status_of("sandbox_endpoint"), "fail");
        assert_eq!(status_of("pricing_command"), "fail");
        assert_eq!(status_of("slack_token_readiness"), "skipped");
    });
}

#[test]
fn doctor_human_output_lists_checks() {
    with_env(&[], || {
        let result = doctor::run(false);

        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] sandbox_endpoint:"));
    });
}

#[test]
fn config_attributes_sources_and_redacts_secrets() {
    with_env(
        &[
            ("CLOUDCOST_MODEL_API_KEY", "sk-very-secret"),
            ("AWS_REGION", "eu-west-1"),
            ("CLOUDCOST_SLACK_APP_TOKEN", "xapp-1-secret"),
        ],
        || {
            let output = config::run();

            assert!(output.contains("- cloud.region = eu-west-1 (source: env (AWS_REGION))"));
            assert!(output.contains("- model.api_key = <redacted> (source: env (CLOUDCOST_MODEL_API_KEY))"));
            assert!(output.contains("- slack.app_token = xapp-*** (source: env (CLOUDCOST_SLACK_APP_TOKEN))"));
            assert!(output.contains("- sandbox.endpoint = <unset> (source: default)"));
            assert!(!output.contains("sk-very-secret"));
            assert!(output.contains("validation: "));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "AWS_REGION",
        "AWS_PROFILE",
        "CLOUDCOST_CLOUD_REGION",
        "CLOUDCOST_CLOUD_PROFILE",
        "CLOUDCOST_MODEL_PROVIDER",
        "CLOUDCOST_MODEL_API_KEY",
        "CLOUDCOST_MODEL_BASE_URL",
        "CLOUDCOST_MODEL_NAME",
        "CLOUDCOST_MODEL_MAX_TOKENS",
        "CLOUDCOST_MODEL_TIMEOUT_SECS",
        "CLOUDCOST_MODEL_MAX_TOOL_ROUNDS",
        "CLOUDCOST_SANDBOX_ENDPOINT",
        "CLOUDCOST_SANDBOX_API_KEY",
        "CLOUDCOST_SANDBOX_TIMEOUT_SECS",
        "CLOUDCOST_PRICING_COMMAND",
        "CLOUDCOST_PRICING_ARGS",
        "CLOUDCOST_SLACK_ENABLED",
        "CLOUDCOST_SLACK_APP_TOKEN",
        "CLOUDCOST_SLACK_BOT_TOKEN",
        "CLOUDCOST_SERVER_BIND_ADDRESS",
        "CLOUDCOST_SERVER_PORT",
        "CLOUDCOST_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CLOUDCOST_RUNTIME_URL",
        "CLOUDCOST_RUNTIME_BEARER_TOKEN",
        "CLOUDCOST_LOGGING_LEVEL",
        "CLOUDCOST_LOGGING_FORMAT",
        "CLOUDCOST_LOG_LEVEL",
        "CLOUDCOST_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
