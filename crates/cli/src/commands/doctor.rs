use cloudcost_core::config::{AppConfig, LoadOptions, ModelProvider};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::CommandResult;

pub const EXIT_NOT_READY: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_NOT_READY };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult::text(exit_code, output)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.extend(component_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            // Keep reporting per-component readiness so every gap shows up in one run.
            match AppConfig::resolve(LoadOptions::default()) {
                Ok(config) => checks.extend(component_checks(&config)),
                Err(_) => {
                    for name in
                        ["model_credentials", "sandbox_endpoint", "pricing_command", "slack_token_readiness"]
                    {
                        checks.push(DoctorCheck::skipped(
                            name,
                            "skipped because configuration did not load",
                        ));
                    }
                }
            }
        }
    }

    let ready = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if ready { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if ready {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn component_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    vec![
        check_model_credentials(config),
        check_sandbox_endpoint(config),
        check_pricing_command(config),
        check_slack_tokens(config),
    ]
}

fn check_model_credentials(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "model_credentials";
    let provider = config.model.provider;

    if provider == ModelProvider::Ollama {
        return DoctorCheck::pass(
            NAME,
            format!("{provider} needs no api key; using {}", config.model_base_url()),
        );
    }

    let has_key = config
        .model
        .api_key
        .as_ref()
        .is_some_and(|key| !key.expose_secret().trim().is_empty());
    if has_key {
        DoctorCheck::pass(NAME, format!("{provider} api key present for model `{}`", config.model.model))
    } else {
        DoctorCheck::fail(NAME, format!("{provider} requires CLOUDCOST_MODEL_API_KEY"))
    }
}

fn check_sandbox_endpoint(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "sandbox_endpoint";
    match config.sandbox.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {
            DoctorCheck::pass(NAME, format!("code interpreter at {endpoint}"))
        }
        Some(endpoint) => {
            DoctorCheck::fail(NAME, format!("`{endpoint}` is not an http(s) url"))
        }
        None => DoctorCheck::fail(NAME, "set CLOUDCOST_SANDBOX_ENDPOINT to the code interpreter API"),
    }
}

fn check_pricing_command(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "pricing_command";
    let command = config.pricing.command.trim();
    if command.is_empty() {
        return DoctorCheck::fail(NAME, "pricing.command is empty");
    }

    match which::which(command) {
        Ok(path) => DoctorCheck::pass(NAME, format!("`{command}` resolved to {}", path.display())),
        Err(error) => DoctorCheck::fail(NAME, format!("`{command}` not found on PATH: {error}")),
    }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    const NAME: &str = "slack_token_readiness";
    if !config.slack.enabled {
        return DoctorCheck::skipped(NAME, "slack adapter disabled");
    }

    let app_token = config.slack.app_token.expose_secret();
    let bot_token = config.slack.bot_token.expose_secret();
    if !app_token.starts_with("xapp-") {
        return DoctorCheck::fail(NAME, "slack.app_token must start with `xapp-`");
    }
    if !bot_token.starts_with("xoxb-") {
        return DoctorCheck::fail(NAME, "slack.bot_token must start with `xoxb-`");
    }
    DoctorCheck::pass(NAME, "socket mode app token and bot token present")
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_report_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck::pass("config_validation", "ok"),
                DoctorCheck::fail("sandbox_endpoint", "missing"),
                DoctorCheck::skipped("slack_token_readiness", "disabled"),
            ],
        };

        let rendered = render_human(&report);

        assert!(rendered.contains("- [ok] config_validation: ok"));
        assert!(rendered.contains("- [fail] sandbox_endpoint: missing"));
        assert!(rendered.contains("- [skip] slack_token_readiness: disabled"));
    }
}
