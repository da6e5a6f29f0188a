use docbot_core::config::{AppConfig, LoadOptions};
use docbot_docs::mdn::http_client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::commands::{escape_json, register, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    id: String,
    username: String,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                concat!(
                    "{{\"overall_status\":\"fail\",",
                    "\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}"
                ),
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

pub fn build_report<E: std::fmt::Display>(loaded: Result<AppConfig, E>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_command_definitions(&config));
            checks.push(check_discord_api(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["command_definitions", "discord_api"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_command_definitions(config: &AppConfig) -> DoctorCheck {
    let outcome = register::command_definitions(config).and_then(|definitions| {
        for definition in &definitions {
            definition.validate().map_err(|error| format!("`{}`: {error}", definition.name))?;
        }
        Ok(definitions.len())
    });

    match outcome {
        Ok(count) => DoctorCheck {
            name: "command_definitions",
            status: CheckStatus::Pass,
            details: format!("{count} slash-command definitions are valid"),
        },
        Err(details) => {
            DoctorCheck { name: "command_definitions", status: CheckStatus::Fail, details }
        }
    }
}

fn check_discord_api(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "discord_api",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    match runtime.block_on(fetch_bot_user(config)) {
        Ok(user) => DoctorCheck {
            name: "discord_api",
            status: CheckStatus::Pass,
            details: format!("authenticated as {} ({})", user.username, user.id),
        },
        Err(details) => DoctorCheck { name: "discord_api", status: CheckStatus::Fail, details },
    }
}

async fn fetch_bot_user(config: &AppConfig) -> Result<BotUser, String> {
    let http = http_client(config.docs.http_timeout_secs).map_err(|error| error.to_string())?;
    let url = format!("{}/users/@me", config.discord.api_base_url.trim_end_matches('/'));
    let response = http
        .get(&url)
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Bot {}", config.discord.token.expose_secret()),
        )
        .send()
        .await
        .map_err(|error| format!("failed to reach {url}: {error}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("{url} answered {status}; check discord.token"));
    }
    response
        .json::<BotUser>()
        .await
        .map_err(|error| format!("unexpected response from {url}: {error}"))
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

#[cfg(test)]
mod tests {
    use docbot_core::config::AppConfig;

    use super::{build_report, render_human, CheckStatus};

    #[test]
    fn config_failure_skips_the_remaining_checks() {
        let report = build_report::<String>(Err("discord.token is required".to_string()));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        let statuses: Vec<CheckStatus> = report.checks.iter().map(|check| check.status).collect();
        assert_eq!(statuses, vec![CheckStatus::Fail, CheckStatus::Skipped, CheckStatus::Skipped]);
        let rendered = render_human(&report);
        assert!(rendered.contains("- [fail] config_validation: discord.token is required"));
    }

    #[test]
    fn unreachable_api_fails_only_the_api_check() {
        let mut config = AppConfig::default();
        config.discord.api_base_url = "http://127.0.0.1:9".to_string();
        config.docs.http_timeout_secs = 2;

        let report = build_report::<String>(Ok(config));

        assert_eq!(report.checks[1].status, CheckStatus::Pass);
        assert_eq!(report.checks[1].details, "3 slash-command definitions are valid");
        assert_eq!(report.checks[2].status, CheckStatus::Fail);
        assert_eq!(report.overall_status, CheckStatus::Fail);
    }
}
