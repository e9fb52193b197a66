use std::path::Path;

use serde::Serialize;
use ubermelon_core::config::{AppConfig, LoadOptions, SHOP_TEMPLATES};
use ubermelon_core::shop::catalog::Catalog;

use super::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
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

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

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

    CommandResult { exit_code, output }
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
            checks.push(check_session_secret(&config));
            checks.push(check_catalog(&config));
            checks.push(check_template_dir(&config.templates.dir));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["session_secret", "catalog_load", "template_directory"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let any_warn = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if any_fail {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if any_warn {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_session_secret(config: &AppConfig) -> DoctorCheck {
    if config.session.secret.is_some() {
        return DoctorCheck {
            name: "session_secret",
            status: CheckStatus::Pass,
            details: "session secret configured".to_string(),
        };
    }
    DoctorCheck {
        name: "session_secret",
        status: CheckStatus::Warn,
        details: "no session secret; carts are lost whenever the server restarts".to_string(),
    }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    match Catalog::load_or_builtin(config.catalog.path.as_deref()) {
        Ok(catalog) => {
            let source = config
                .catalog
                .path
                .as_ref()
                .map(|path| format!("`{}`", path.display()))
                .unwrap_or_else(|| "builtin catalog".to_string());
            DoctorCheck {
                name: "catalog_load",
                status: CheckStatus::Pass,
                details: format!("{} melons loaded from {source}", catalog.len()),
            }
        }
        Err(error) => {
            DoctorCheck { name: "catalog_load", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_template_dir(dir: &Path) -> DoctorCheck {
    if !dir.is_dir() {
        return DoctorCheck {
            name: "template_directory",
            status: CheckStatus::Warn,
            details: format!("`{}` not found; the server will use embedded templates", dir.display()),
        };
    }

    let missing: Vec<&str> =
        SHOP_TEMPLATES.iter().copied().filter(|name| !dir.join(name).is_file()).collect();
    if missing.is_empty() {
        return DoctorCheck {
            name: "template_directory",
            status: CheckStatus::Pass,
            details: format!("all {} shop templates present in `{}`", SHOP_TEMPLATES.len(), dir.display()),
        };
    }

    DoctorCheck {
        name: "template_directory",
        status: CheckStatus::Warn,
        details: format!(
            "`{}` is missing {}; the server will use embedded templates",
            dir.display(),
            missing.join(", ")
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
