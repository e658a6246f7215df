use atelier_core::config::{AppConfig, LoadOptions};
use atelier_core::sources::StorageLister;
use atelier_db::{connect_with_config, ping, storage_lister_from_config};
use serde::Serialize;
use tokio::runtime::Runtime;

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

const RUNTIME_CHECKS: [&str; 3] = ["database_connectivity", "catalog_schema", "storage_readiness"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_email(&config));
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => checks.extend(runtime_checks(&runtime, &config)),
                Err(error) => {
                    for name in RUNTIME_CHECKS {
                        checks.push(DoctorCheck::fail(
                            name,
                            format!("failed to initialize async runtime: {error}"),
                        ));
                    }
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped(
                "email_readiness",
                "skipped because configuration did not load",
            ));
            for name in RUNTIME_CHECKS {
                checks.push(DoctorCheck::skipped(
                    name,
                    "skipped because configuration did not load",
                ));
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

fn check_email(config: &AppConfig) -> DoctorCheck {
    if config.email.enabled {
        DoctorCheck::pass(
            "email_readiness",
            format!("sending through function endpoint as `{}`", config.email.from_address),
        )
    } else {
        DoctorCheck::pass("email_readiness", "email disabled; templated sends will be rejected")
    }
}

fn runtime_checks(runtime: &Runtime, config: &AppConfig) -> Vec<DoctorCheck> {
    runtime.block_on(async {
        let mut checks = Vec::with_capacity(RUNTIME_CHECKS.len());

        match connect_with_config(&config.database).await {
            Ok(pool) => {
                checks.push(match ping(&pool).await {
                    Ok(()) => DoctorCheck::pass(
                        "database_connectivity",
                        format!("connected using `{}`", config.database.url),
                    ),
                    Err(error) => DoctorCheck::fail(
                        "database_connectivity",
                        format!("database did not answer ping: {error}"),
                    ),
                });

                let schema: Result<i64, _> = sqlx::query_scalar(
                    "SELECT COUNT(1) FROM sqlite_master
                     WHERE type = 'table' AND name IN ('jewelry_items', 'customization_settings',
                                                       'customization_options',
                                                       'customization_logic_rules')",
                )
                .fetch_one(&pool)
                .await;
                checks.push(match schema {
                    Ok(4) => DoctorCheck::pass("catalog_schema", "catalog tables present"),
                    Ok(_) => DoctorCheck::fail(
                        "catalog_schema",
                        "catalog tables missing; run `atelier migrate`",
                    ),
                    Err(error) => DoctorCheck::fail("catalog_schema", error.to_string()),
                });

                pool.close().await;
            }
            Err(error) => {
                checks.push(DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to connect to database: {error}"),
                ));
                checks.push(DoctorCheck::skipped(
                    "catalog_schema",
                    "skipped because the database is unreachable",
                ));
            }
        }

        checks.push(match storage_lister_from_config(&config.storage) {
            Ok(lister) => match lister.list(&config.storage.variant_bucket, "").await {
                Ok(names) => DoctorCheck::pass(
                    "storage_readiness",
                    format!(
                        "{:?} storage reachable; bucket `{}` lists {} object(s)",
                        config.storage.provider,
                        config.storage.variant_bucket,
                        names.len()
                    ),
                ),
                Err(error) => DoctorCheck::fail("storage_readiness", error.to_string()),
            },
            Err(error) => DoctorCheck::fail("storage_readiness", error.to_string()),
        });

        checks
    })
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
