//! `watchpost scan` command handler
//!
//! Runs one plan against one target in-process: build the engine, create
//! the scan, START it and wait. Ctrl-C sends STOP and keeps waiting so the
//! partial results still get reported.

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use watchpost_core::{
    Configuration, Issue, Scan, ScanMeta, ScanState, SessionFailure, SessionState,
    WatchpostConfig,
};
use watchpost_engine::{Engine, ScanSummary, summarize};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, scan_state_label, session_state_label, severity_label};

/// How often the scan record is re-read while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Execute the `scan` command.
///
/// # Errors
///
/// * `CliError::ScanFailed` when the scan ends FAILED
/// * `CliError::IssuesFound` when any High or Fatal issue was reported
/// * `CliError::Command` for malformed `--set` values
pub async fn execute(
    args: ScanArgs,
    config: WatchpostConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let configuration = build_configuration(&args.target, &args.settings)?;
    let meta = ScanMeta {
        owner: args.owner,
        tags: args.tags,
    };

    let engine = Engine::builder().config(config).build().await?;
    let result = run(&engine, &args.plan, configuration, meta).await;
    engine.shutdown().await;
    let scan = result?;

    let report = ScanReport::from_scan(&args.target, &scan);
    writer.render(&report)?;
    outcome(&report.summary)
}

async fn run(
    engine: &Engine,
    plan: &str,
    configuration: Configuration,
    meta: ScanMeta,
) -> Result<Scan, CliError> {
    let orchestrator = engine.orchestrator();
    let scan = orchestrator.create_with_meta(plan, configuration, meta)?;
    let id = scan.id;
    orchestrator.control(id, "START")?;
    info!(scan_id = %id, plan, "scan started");

    let wait = orchestrator.wait_until_terminal(id, POLL_INTERVAL);
    tokio::pin!(wait);
    let mut stop_sent = false;

    let scan = loop {
        tokio::select! {
            result = &mut wait => break result?,
            signal = tokio::signal::ctrl_c(), if !stop_sent => {
                signal?;
                stop_sent = true;
                warn!(scan_id = %id, "interrupted, stopping scan");
                if let Err(e) = orchestrator.control(id, "STOP") {
                    warn!(scan_id = %id, error = %e, "stop rejected");
                }
            }
        }
    };

    info!(scan_id = %id, state = %scan.state, "scan ended");
    Ok(scan)
}

/// Maps the final scan to the process outcome.
fn outcome(summary: &ScanSummary) -> Result<(), CliError> {
    if summary.state == ScanState::Failed {
        return Err(CliError::ScanFailed(format!("scan {} failed", summary.id)));
    }
    let severe = summary.issues.high + summary.issues.fatal;
    if severe > 0 {
        return Err(CliError::IssuesFound(format!(
            "scan {} reported {} high or fatal issues",
            summary.id, severe
        )));
    }
    Ok(())
}

/// Scan configuration from the target and `--set key=value` pairs.
///
/// Values parse as JSON when they can (`true`, `3`, `["a"]`) and fall back
/// to plain strings. Dotted keys build nested objects.
pub fn build_configuration(target: &str, settings: &[String]) -> Result<Configuration, CliError> {
    let mut configuration = Configuration::new();
    configuration.insert("target".to_owned(), Value::String(target.to_owned()));

    for setting in settings {
        let (key, raw) = setting
            .split_once('=')
            .ok_or_else(|| CliError::Command(format!("expected KEY=VALUE, got '{}'", setting)))?;
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(CliError::Command(format!("invalid key in '{}'", setting)));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        insert_path(&mut configuration, key, value)?;
    }

    Ok(configuration)
}

fn insert_path(map: &mut Configuration, key: &str, value: Value) -> Result<(), CliError> {
    match key.split_once('.') {
        None => {
            map.insert(key.to_owned(), value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_owned())
                .or_insert_with(|| Value::Object(Configuration::new()));
            match child {
                Value::Object(inner) => insert_path(inner, rest, value),
                _ => Err(CliError::Command(format!(
                    "'{}' is already set to a non-object value",
                    head
                ))),
            }
        }
    }
}

// ─── Report ──────────────────────────────────────────────────────────

/// Final scan with per-session details.
#[derive(Serialize)]
pub struct ScanReport {
    pub target: String,
    pub summary: ScanSummary,
    pub sessions: Vec<SessionReport>,
}

#[derive(Serialize)]
pub struct SessionReport {
    pub plugin: String,
    pub state: SessionState,
    pub issues: Vec<Issue>,
    pub artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SessionFailure>,
}

impl ScanReport {
    pub fn from_scan(target: &str, scan: &Scan) -> Self {
        Self {
            target: target.to_owned(),
            summary: summarize(scan),
            sessions: scan
                .sessions
                .iter()
                .map(|s| SessionReport {
                    plugin: s.plugin.identifier.clone(),
                    state: s.state,
                    issues: s.issues.clone(),
                    artifacts: s.artifacts.keys().cloned().collect(),
                    failure: s.failure.clone(),
                })
                .collect(),
        }
    }
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let summary = &self.summary;
        writeln!(w, "{}", "Scan Results".bold())?;
        writeln!(w, "Scan:   {}", summary.id)?;
        writeln!(w, "Target: {}", self.target)?;
        writeln!(w, "Plan:   {} (revision {})", summary.plan.name, summary.plan.revision)?;
        writeln!(w, "State:  {}", scan_state_label(summary.state))?;
        writeln!(
            w,
            "Issues: {} fatal, {} high, {} medium, {} low, {} info",
            summary.issues.fatal,
            summary.issues.high,
            summary.issues.medium,
            summary.issues.low,
            summary.issues.info
        )?;
        writeln!(w)?;

        writeln!(
            w,
            "{:<24} {:<10} {:<8} {:<28} SUMMARY",
            "PLUGIN".bold(),
            "STATE".bold(),
            "SEVERITY".bold(),
            "CODE".bold()
        )?;
        writeln!(w, "{}", "-".repeat(80))?;

        for session in &self.sessions {
            let state = session_state_label(session.state);
            if session.issues.is_empty() {
                writeln!(w, "{:<24} {:<10}", session.plugin, state)?;
            }
            for issue in &session.issues {
                writeln!(
                    w,
                    "{:<24} {:<10} {:<8} {:<28} {}",
                    session.plugin,
                    state,
                    severity_label(issue.severity),
                    issue.code,
                    issue.summary
                )?;
            }
            if let Some(failure) = &session.failure {
                writeln!(
                    w,
                    "  {} {} on {}: {}",
                    "failed".red(),
                    failure.kind,
                    failure.hostname,
                    failure.message
                )?;
            }
            if !session.artifacts.is_empty() {
                writeln!(w, "  artifacts: {}", session.artifacts.join(", ").dimmed())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use watchpost_core::{ExecutionMode, PlanRef, PluginDescriptor, Session, Severity, Weight};

    use super::*;

    fn scan_with(issues: Vec<Issue>, state: ScanState) -> Scan {
        let descriptor = PluginDescriptor {
            identifier: "x-frame-options".to_owned(),
            name: "XFrameOptions".to_owned(),
            version: "0.1".to_owned(),
            weight: Weight::Light,
            mode: ExecutionMode::Blocking,
        };
        let now = Utc::now();
        let mut session = Session::new(descriptor, Configuration::new(), "", now);
        session.issues = issues;
        let mut scan = Scan::new(
            PlanRef {
                name: "headers".to_owned(),
                revision: 1,
            },
            build_configuration("http://example.test", &[]).expect("config"),
            vec![session],
            ScanMeta::default(),
            now,
        );
        scan.state = state;
        scan
    }

    #[test]
    fn test_build_configuration_parses_values() {
        let settings = vec![
            "follow_redirects=false".to_owned(),
            "retries=3".to_owned(),
            "label=nightly run".to_owned(),
            "opts.depth=2".to_owned(),
            "opts.mode=\"fast\"".to_owned(),
        ];
        let config = build_configuration("http://example.test", &settings).expect("valid");
        assert_eq!(config["target"], json!("http://example.test"));
        assert_eq!(config["follow_redirects"], json!(false));
        assert_eq!(config["retries"], json!(3));
        assert_eq!(config["label"], json!("nightly run"));
        assert_eq!(config["opts"], json!({"depth": 2, "mode": "fast"}));
    }

    #[test]
    fn test_build_configuration_rejects_malformed_pairs() {
        assert!(build_configuration("t", &["novalue".to_owned()]).is_err());
        assert!(build_configuration("t", &["=1".to_owned()]).is_err());
        assert!(build_configuration("t", &["a..b=1".to_owned()]).is_err());
        assert!(build_configuration("t", &["a=1".to_owned(), "a.b=2".to_owned()]).is_err());
    }

    #[test]
    fn test_outcome_clean_scan_succeeds() {
        let scan = scan_with(
            vec![Issue::new("XFO-0", Severity::Info, "present", "")],
            ScanState::Finished,
        );
        assert!(outcome(&summarize(&scan)).is_ok());
    }

    #[test]
    fn test_outcome_high_issue_exits_4() {
        let scan = scan_with(
            vec![Issue::new("XFO-1", Severity::High, "missing", "")],
            ScanState::Finished,
        );
        let err = outcome(&summarize(&scan)).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_outcome_failed_scan_exits_5() {
        let scan = scan_with(
            vec![Issue::new("ALIVE-1", Severity::Fatal, "unreachable", "")],
            ScanState::Failed,
        );
        let err = outcome(&summarize(&scan)).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_report_text_lists_issues() {
        colored::control::set_override(false);
        let scan = scan_with(
            vec![Issue::new("XFO-1", Severity::High, "header missing", "")],
            ScanState::Finished,
        );
        let report = ScanReport::from_scan("http://example.test", &scan);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("XFO-1"));
        assert!(output.contains("HIGH"));
        assert!(output.contains("1 high"));
    }
}
