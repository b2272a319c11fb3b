//! `csp` -- Content-Security-Policy headers and policy sanity.
//!
//! Header presence is always reported. When a `Content-Security-Policy`
//! header is present its policy is parsed and checked for unknown and
//! deprecated directives, misuse of `'none'`, and unsafe script/style
//! sources.

use watchpost_core::{Issue, PluginContext, PluginOutcome, Severity, Weight};

use super::fetch_target;
use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[
    ("http://www.w3.org/TR/CSP/", "W3C - Content-Security Policy 1.0"),
    (
        "https://developer.mozilla.org/en-US/docs/Security/CSP",
        "Mozilla Developer Network - CSP (Content-Security Policy)",
    ),
    (
        "https://www.owasp.org/index.php/Content_Security_Policy",
        "OWASP - Content-Security Policy",
    ),
];

const CSP_TEXT: &str = "Content-Security-Policy (CSP) is an added layer of security that helps to detect and mitigate certain types of attacks, including Cross Site Scripting (XSS) and data injection attacks.";
const XCSP_TEXT: &str = "X-Content-Security-Policy header is deprecated by major browsers. Keep it only alongside Content-Security-Policy for out-of-date browsers.";
const REPORT_ONLY_TEXT: &str = "The Report-Only header lets developers experiment with CSP settings without enforcing them. A Report-Only header without the enforcing header is the same as not having CSP at all.";

const CSP_SET: Template = Template {
    code: "CSP-1",
    summary: "Content-Security-Policy header is set",
    description: CSP_TEXT,
    severity: Severity::Info,
};

const CSP_NOT_SET: Template = Template {
    code: "CSP-2",
    summary: "Content-Security-Policy header is not set",
    description: CSP_TEXT,
    severity: Severity::High,
};

const CSP_REPORT_ONLY: Template = Template {
    code: "CSP-3",
    summary: "Content-Security-Policy-Report-Only header is set but CSP is missing",
    description: REPORT_ONLY_TEXT,
    severity: Severity::High,
};

const XCSP_SET: Template = Template {
    code: "CSP-4",
    summary: "X-Content-Security-Policy header is set",
    description: XCSP_TEXT,
    severity: Severity::Info,
};

const XCSP_NOT_SET: Template = Template {
    code: "CSP-5",
    summary: "X-Content-Security-Policy header is not set",
    description: XCSP_TEXT,
    severity: Severity::High,
};

const XCSP_REPORT_ONLY: Template = Template {
    code: "CSP-6",
    summary: "X-Content-Security-Policy-Report-Only header is set but X-CSP is missing",
    description: REPORT_ONLY_TEXT,
    severity: Severity::High,
};

const CSP_DUAL: Template = Template {
    code: "CSP-7",
    summary: "Both Content-Security-Policy and Report-Only headers are set",
    description: "The site enforces one policy while reporting on another.",
    severity: Severity::Info,
};

const XCSP_DUAL: Template = Template {
    code: "CSP-8",
    summary: "Both X-Content-Security-Policy and Report-Only headers are set",
    description: "The site enforces one policy while reporting on another.",
    severity: Severity::Info,
};

const UNKNOWN_DIRECTIVE: Template = Template {
    code: "CSP-9",
    summary: "Found {count} unrecognized CSP directives",
    description: "The following directives are not part of CSP 1.0:\n{policies}",
    severity: Severity::High,
};

const DEPRECATED_DIRECTIVE: Template = Template {
    code: "CSP-10",
    summary: "Found {count} deprecated CSP directives",
    description: "{solutions}",
    severity: Severity::High,
};

const BAD_NONE: Template = Template {
    code: "CSP-11",
    summary: "When 'none' is specified, no other source expressions can be specified",
    description: "The following directives specify 'none' and other sources:\n{policies}",
    severity: Severity::High,
};

const UNSAFE_INLINE: Template = Template {
    code: "CSP-12",
    summary: "unsafe-inline is enabled",
    description: "Inline script or style is allowed, which makes cross-site scripting possible. The following policies have unsafe-inline specified:\n{policies}",
    severity: Severity::High,
};

const UNSAFE_EVAL: Template = Template {
    code: "CSP-13",
    summary: "unsafe-eval is enabled",
    description: "eval() and similar string-to-code functions are allowed. The following policies have unsafe-eval specified:\n{policies}",
    severity: Severity::High,
};

/// CSP 1.0 directive names.
pub const DIRECTIVES: [&str; 10] = [
    "default-src",
    "script-src",
    "style-src",
    "object-src",
    "img-src",
    "media-src",
    "frame-src",
    "font-src",
    "connect-src",
    "report-uri",
];

/// Deprecated directive and its replacement.
const DEPRECATED: [(&str, &str); 2] = [("allow", "default-src"), ("xhr-src", "connect-src")];

/// One `directive source...` group of a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub sources: Vec<String>,
}

impl Directive {
    fn has_source(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }

    fn text(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.sources.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Splits a policy on `;`, then each group on whitespace. Empty groups are
/// dropped.
pub fn parse_policy(policy: &str) -> Vec<Directive> {
    policy
        .split(';')
        .filter_map(|group| {
            let mut parts = group.split_whitespace();
            let name = parts.next()?;
            Some(Directive {
                name: name.to_owned(),
                sources: parts.map(str::to_owned).collect(),
            })
        })
        .collect()
}

fn header_issues(ctx: &PluginContext, present: impl Fn(&str) -> bool) -> Vec<Issue> {
    let mut issues = Vec::new();
    let url = ctx.target.as_str();

    let csp = present("content-security-policy");
    let csp_ro = present("content-security-policy-report-only");
    issues.push(if csp { CSP_SET } else { CSP_NOT_SET }.issue(url, LINKS));
    if csp && csp_ro {
        issues.push(CSP_DUAL.issue(url, LINKS));
    } else if csp_ro {
        issues.push(CSP_REPORT_ONLY.issue(url, LINKS));
    }

    let xcsp = present("x-content-security-policy");
    let xcsp_ro = present("x-content-security-policy-report-only");
    issues.push(if xcsp { XCSP_SET } else { XCSP_NOT_SET }.issue(url, LINKS));
    if xcsp && xcsp_ro {
        issues.push(XCSP_DUAL.issue(url, LINKS));
    } else if xcsp_ro {
        issues.push(XCSP_REPORT_ONLY.issue(url, LINKS));
    }

    issues
}

/// Findings for a parsed `Content-Security-Policy`.
pub fn policy_issues(url: &str, directives: &[Directive]) -> Vec<Issue> {
    let mut issues = Vec::new();

    let mut unknown = Vec::new();
    let mut solutions = Vec::new();
    for d in directives {
        if let Some((_, replacement)) = DEPRECATED.iter().find(|(old, _)| *old == d.name) {
            let renamed = Directive {
                name: (*replacement).to_owned(),
                sources: d.sources.clone(),
            };
            solutions.push(format!(
                "{} is deprecated. Replace {} with {}",
                d.name,
                d.text(),
                renamed.text()
            ));
        } else if !DIRECTIVES.contains(&d.name.as_str()) {
            unknown.push(d.text());
        }
    }
    if !unknown.is_empty() {
        let count = unknown.len().to_string();
        let policies = unknown.join("\n");
        issues.push(UNKNOWN_DIRECTIVE.render(
            url,
            LINKS,
            &[("count", count.as_str()), ("policies", policies.as_str())],
        ));
    }
    if !solutions.is_empty() {
        let count = solutions.len().to_string();
        let text = solutions.join("\n");
        issues.push(DEPRECATED_DIRECTIVE.render(
            url,
            LINKS,
            &[("count", count.as_str()), ("solutions", text.as_str())],
        ));
    }

    let mut bad_none = Vec::new();
    let mut inline = Vec::new();
    let mut eval = Vec::new();
    for d in directives {
        if d.has_source("'none'") && d.sources.len() > 1 {
            bad_none.push(d.text());
            continue;
        }
        if d.name == "script-src" || d.name == "style-src" {
            if d.has_source("'unsafe-inline'") {
                inline.push(d.text());
            }
            if d.has_source("'unsafe-eval'") {
                eval.push(d.text());
            }
        }
    }
    for (template, found) in [(BAD_NONE, bad_none), (UNSAFE_INLINE, inline), (UNSAFE_EVAL, eval)] {
        if !found.is_empty() {
            let policies = found.join("\n");
            issues.push(template.render(url, LINKS, &[("policies", policies.as_str())]));
        }
    }

    issues
}

pub struct Csp;

impl BlockingCheck for Csp {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "csp",
            name: "CSP",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        let response = match fetch_target(probe, ctx) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };
        let mut issues = header_issues(ctx, |name| response.has_header(name));
        if let Some(policy) = response.header("content-security-policy") {
            issues.extend(policy_issues(&ctx.target, &parse_policy(policy)));
        }
        PluginOutcome::Completed(issues)
    }
}
