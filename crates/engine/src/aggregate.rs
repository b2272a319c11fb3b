//! Issue aggregation -- summaries and reports computed on read.
//!
//! Nothing here is cached: every call walks the live issue lists, so a
//! summary always matches the sessions it was computed from.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use watchpost_core::{
    Configuration, PlanRef, PluginDescriptor, Scan, ScanState, SessionState, Severity,
    StorageError,
};

use crate::store::ScanStore;

// ─── Summary ─────────────────────────────────────────────────────────

/// Issue counts per severity. Fatal has its own bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub fatal: usize,
}

impl IssueCounts {
    /// Counts every issue of every session.
    pub fn of(scan: &Scan) -> Self {
        let mut counts = Self::default();
        for issue in scan.sessions.iter().flat_map(|s| &s.issues) {
            counts.add(issue.severity);
        }
        counts
    }

    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Fatal => self.fatal += 1,
        }
    }

    /// Count for one severity.
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Info => self.info,
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Fatal => self.fatal,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low + self.info + self.fatal
    }
}

/// Session line of a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub plugin: PluginDescriptor,
    pub id: Uuid,
    pub state: SessionState,
}

/// Client-facing projection of a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub id: Uuid,
    pub state: ScanState,
    pub configuration: Configuration,
    pub plan: PlanRef,
    pub sessions: Vec<SessionSummary>,
    pub created: DateTime<Utc>,
    pub queued: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub issues: IssueCounts,
}

/// Summarizes `scan`.
pub fn summarize(scan: &Scan) -> ScanSummary {
    ScanSummary {
        id: scan.id,
        state: scan.state,
        configuration: scan.configuration.clone(),
        plan: scan.plan.clone(),
        sessions: scan
            .sessions
            .iter()
            .map(|s| SessionSummary {
                plugin: s.plugin.clone(),
                id: s.id,
                state: s.state,
            })
            .collect(),
        created: scan.created,
        queued: scan.queued,
        finished: scan.finished,
        issues: IssueCounts::of(scan),
    }
}

// ─── Reports ─────────────────────────────────────────────────────────

/// Latest scan of one (target, plan) pair. `scan` is `None` for a pair the
/// caller may see that was never scanned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEntry {
    pub target: String,
    pub plan: String,
    pub scan: Option<ScanSummary>,
}

/// One issue in the issues report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueEntry {
    pub severity: Severity,
    pub summary: String,
    pub code: String,
    pub scan_id: Uuid,
}

/// Issues of a target's latest scan per plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetIssues {
    pub target: String,
    pub issues: Vec<IssueEntry>,
}

/// Read-only reports over the stored scans.
///
/// `targets` restricts a report to the targets a caller may see; `None`
/// means no restriction. The target filter is applied before the history
/// cap.
#[derive(Clone)]
pub struct Reports {
    store: Arc<dyn ScanStore>,
    history_limit: usize,
    plans: Vec<String>,
}

impl Reports {
    pub fn new(store: Arc<dyn ScanStore>, history_limit: usize) -> Self {
        Self {
            store,
            history_limit,
            plans: Vec::new(),
        }
    }

    /// Plan names listed for every requested target in the status report.
    pub fn with_plans(mut self, plans: impl IntoIterator<Item = String>) -> Self {
        self.plans = plans.into_iter().collect();
        self
    }

    fn scans(&self, targets: Option<&[String]>, limit: usize) -> Result<Vec<Scan>, StorageError> {
        match targets {
            None => self.store.recent(limit, &|_: &Scan| true),
            Some(allowed) => {
                let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
                self.store.recent(limit, &|scan: &Scan| {
                    scan.target().is_some_and(|t| allowed.contains(t))
                })
            }
        }
    }

    /// Scan summaries, newest first, capped at the history limit.
    pub fn history(&self, targets: Option<&[String]>) -> Result<Vec<ScanSummary>, StorageError> {
        Ok(self
            .scans(targets, self.history_limit)?
            .iter()
            .map(summarize)
            .collect())
    }

    /// Latest scan per (target, plan) over every stored scan, newest first.
    ///
    /// With a target filter, each requested target is also paired with every
    /// known plan; pairs without a scan follow with `scan: None`.
    pub fn status(&self, targets: Option<&[String]>) -> Result<Vec<StatusEntry>, StorageError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for scan in self.scans(targets, usize::MAX)? {
            let Some(target) = scan.target() else { continue };
            if seen.insert((target.to_owned(), scan.plan.name.clone())) {
                entries.push(StatusEntry {
                    target: target.to_owned(),
                    plan: scan.plan.name.clone(),
                    scan: Some(summarize(&scan)),
                });
            }
        }
        for target in targets.unwrap_or_default() {
            for plan in &self.plans {
                if seen.insert((target.clone(), plan.clone())) {
                    entries.push(StatusEntry {
                        target: target.clone(),
                        plan: plan.clone(),
                        scan: None,
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Per target, the issues of the latest scan of each plan.
    pub fn issues(&self, targets: Option<&[String]>) -> Result<Vec<TargetIssues>, StorageError> {
        let mut report: Vec<TargetIssues> = Vec::new();
        for entry in self.status(targets)? {
            let Some(summary) = entry.scan else { continue };
            let Some(scan) = self.store.get(summary.id)? else {
                continue;
            };
            let issues = scan.sessions.iter().flat_map(|s| &s.issues).map(|i| IssueEntry {
                severity: i.severity,
                summary: i.summary.clone(),
                code: i.code.clone(),
                scan_id: scan.id,
            });
            match report.iter_mut().find(|r| r.target == entry.target) {
                Some(existing) => existing.issues.extend(issues),
                None => report.push(TargetIssues {
                    target: entry.target,
                    issues: issues.collect(),
                }),
            }
        }
        Ok(report)
    }
}

impl std::fmt::Debug for Reports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reports")
            .field("history_limit", &self.history_limit)
            .field("plans", &self.plans)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::json;
    use watchpost_core::{ExecutionMode, Issue, ScanMeta, Session, Weight};

    use super::*;
    use crate::store::MemoryScanStore;

    fn descriptor() -> PluginDescriptor {
        PluginDescriptor {
            identifier: "alive".to_owned(),
            name: "Alive".to_owned(),
            version: "0.1".to_owned(),
            weight: Weight::Light,
            mode: ExecutionMode::Blocking,
        }
    }

    fn scan_with(target: &str, plan: &str, severities: &[Severity], offset: i64) -> Scan {
        let now = Utc::now() + Duration::seconds(offset);
        let mut session = Session::new(descriptor(), Configuration::new(), "", now);
        session.issues = severities
            .iter()
            .enumerate()
            .map(|(n, s)| Issue::new(format!("T-{n}"), *s, "summary", ""))
            .collect();
        let mut configuration = Configuration::new();
        configuration.insert("target".to_owned(), json!(target));
        Scan::new(
            PlanRef {
                name: plan.to_owned(),
                revision: 1,
            },
            configuration,
            vec![session],
            ScanMeta::default(),
            now,
        )
    }

    #[test]
    fn fatal_gets_its_own_bucket() {
        let scan = scan_with(
            "http://a",
            "basic",
            &[Severity::Fatal, Severity::High, Severity::Info, Severity::Info],
            0,
        );
        let summary = summarize(&scan);
        assert_eq!(
            summary.issues,
            IssueCounts {
                high: 1,
                medium: 0,
                low: 0,
                info: 2,
                fatal: 1
            }
        );
        assert_eq!(summary.sessions.len(), 1);
        assert_eq!(summary.sessions[0].plugin.identifier, "alive");
    }

    #[test]
    fn summary_serializes_bucket_names() {
        let summary = summarize(&scan_with("http://a", "basic", &[Severity::Low], 0));
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["issues"]["low"], 1);
        assert_eq!(value["issues"]["fatal"], 0);
        assert_eq!(value["state"], "CREATED");
    }

    fn reports(scans: Vec<Scan>, limit: usize) -> Reports {
        let store = MemoryScanStore::new();
        for scan in scans {
            store.insert(scan).unwrap();
        }
        Reports::new(Arc::new(store), limit)
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let reports = reports(
            vec![
                scan_with("http://a", "basic", &[], 1),
                scan_with("http://b", "basic", &[], 3),
                scan_with("http://c", "basic", &[], 2),
            ],
            2,
        );
        let targets: Vec<_> = reports
            .history(None)
            .unwrap()
            .into_iter()
            .map(|s| s.configuration["target"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(targets, vec!["http://b", "http://c"]);
    }

    #[test]
    fn status_keeps_latest_per_target_and_plan() {
        let old = scan_with("http://a", "basic", &[Severity::High], 1);
        let new = scan_with("http://a", "basic", &[], 2);
        let other_plan = scan_with("http://a", "headers", &[], 0);
        let new_id = new.id;
        let reports = reports(vec![old, new, other_plan], 100);

        let status = reports.status(None).unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].scan.as_ref().map(|s| s.id), Some(new_id));
        assert_eq!(status[1].plan, "headers");
    }

    #[test]
    fn issues_are_grouped_by_target() {
        let reports = reports(
            vec![
                scan_with("http://a", "basic", &[Severity::High], 2),
                scan_with("http://a", "headers", &[Severity::Info], 1),
                scan_with("http://b", "basic", &[Severity::Low], 0),
            ],
            100,
        );
        let report = reports.issues(None).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].target, "http://a");
        assert_eq!(report[0].issues.len(), 2);
        assert_eq!(report[1].issues[0].severity, Severity::Low);
    }

    #[test]
    fn target_filter_restricts_reports() {
        let reports = reports(
            vec![
                scan_with("http://a", "basic", &[], 0),
                scan_with("http://b", "basic", &[], 1),
            ],
            100,
        );
        let allowed = vec!["http://a".to_owned()];
        assert_eq!(reports.history(Some(allowed.as_slice())).unwrap().len(), 1);
        assert!(reports.status(Some(&[][..])).unwrap().is_empty());
    }

    #[test]
    fn target_filter_applies_before_history_cap() {
        let mut scans = vec![scan_with("http://mine", "basic", &[Severity::High], 0)];
        scans.extend((1..=5).map(|n| scan_with("http://other", "basic", &[], n)));
        let reports = reports(scans, 3);
        let mine = vec!["http://mine".to_owned()];

        let history = reports.history(Some(mine.as_slice())).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].configuration["target"], "http://mine");
        assert_eq!(reports.status(Some(mine.as_slice())).unwrap().len(), 1);
        let issues = reports.issues(Some(mine.as_slice())).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issues[0].severity, Severity::High);
        assert_eq!(reports.history(None).unwrap().len(), 3);
    }

    #[test]
    fn status_ignores_history_cap() {
        let old = scan_with("http://a", "headers", &[], 0);
        let old_id = old.id;
        let mut scans = vec![old];
        scans.extend((1..=4).map(|n| scan_with("http://a", "basic", &[], n)));
        let reports = reports(scans, 2);

        let status = reports.status(None).unwrap();

        assert_eq!(status.len(), 2);
        assert_eq!(status[1].plan, "headers");
        assert_eq!(status[1].scan.as_ref().map(|s| s.id), Some(old_id));
    }

    #[test]
    fn status_lists_unscanned_pairs_for_requested_targets() {
        let scanned = scan_with("http://a", "basic", &[Severity::Low], 0);
        let scanned_id = scanned.id;
        let reports = reports(vec![scanned], 100)
            .with_plans(["basic".to_owned(), "headers".to_owned()]);
        let targets = vec!["http://a".to_owned(), "http://b".to_owned()];

        let status = reports.status(Some(targets.as_slice())).unwrap();

        let pairs: Vec<_> = status
            .iter()
            .map(|e| (e.target.as_str(), e.plan.as_str(), e.scan.as_ref().map(|s| s.id)))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("http://a", "basic", Some(scanned_id)),
                ("http://a", "headers", None),
                ("http://b", "basic", None),
                ("http://b", "headers", None),
            ]
        );
        let value = serde_json::to_value(&status[1]).unwrap();
        assert!(value["scan"].is_null());

        // unscanned pairs carry no issues
        let issues = reports.issues(Some(targets.as_slice())).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].target, "http://a");
    }

    #[test]
    fn unfiltered_status_lists_only_scanned_pairs() {
        let reports = reports(vec![scan_with("http://a", "basic", &[], 0)], 100)
            .with_plans(["basic".to_owned(), "headers".to_owned()]);
        let status = reports.status(None).unwrap();
        assert_eq!(status.len(), 1);
        assert!(status[0].scan.is_some());
    }

    fn any_severity() -> impl Strategy<Value = Severity> {
        prop::sample::select(Severity::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn counts_match_issue_lists(
            sessions in prop::collection::vec(prop::collection::vec(any_severity(), 0..8), 0..6)
        ) {
            let mut scan = scan_with("http://a", "basic", &[], 0);
            scan.sessions = sessions
                .iter()
                .map(|severities| {
                    let mut s = Session::new(descriptor(), Configuration::new(), "", scan.created);
                    s.issues = severities
                        .iter()
                        .map(|sev| Issue::new("P", *sev, "s", ""))
                        .collect();
                    s
                })
                .collect();

            let counts = summarize(&scan).issues;
            for severity in Severity::ALL {
                let expected = sessions.iter().flatten().filter(|s| **s == severity).count();
                prop_assert_eq!(counts.get(severity), expected);
            }
            prop_assert_eq!(counts.total(), sessions.iter().map(Vec::len).sum::<usize>());
        }
    }
}
