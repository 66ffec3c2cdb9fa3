use hrdesk_agent::demo::demo_registry;
use hrdesk_core::capability::names;
use hrdesk_core::config::{AppConfig, LlmProvider, LoadOptions};
use serde::Serialize;

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

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_readiness(&config));
            checks.push(check_capability_coverage());
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "llm_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "capability_coverage",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
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

fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    let details = match config.llm.provider {
        LlmProvider::Ollama => format!(
            "ollama via `{}` with model `{}`; keyword fallback stays available",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            config.llm.model
        ),
        provider => format!(
            "{provider:?} with model `{}`; api key present (validated by config contract)",
            config.llm.model
        ),
    };
    DoctorCheck { name: "llm_readiness", status: CheckStatus::Pass, details }
}

fn check_capability_coverage() -> DoctorCheck {
    let registry = demo_registry();
    let missing: Vec<&str> =
        names::ALL.iter().copied().filter(|name| !registry.contains(name)).collect();

    if missing.is_empty() {
        DoctorCheck {
            name: "capability_coverage",
            status: CheckStatus::Pass,
            details: format!("all {} required capabilities registered", names::ALL.len()),
        }
    } else {
        DoctorCheck {
            name: "capability_coverage",
            status: CheckStatus::Fail,
            details: format!("missing capabilities: {}", missing.join(", ")),
        }
    }
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
        lines.push(format!("[{marker}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
