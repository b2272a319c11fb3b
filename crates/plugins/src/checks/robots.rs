//! `robots` -- presence and basic validity of `/robots.txt`.

use watchpost_core::{FailureKind, PluginContext, PluginFailure, PluginOutcome, Severity, Weight};

use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[
    (
        "http://www.robotstxt.org/robotstxt.html",
        "The Web Robots Pages - About /robots.txt",
    ),
    (
        "https://developers.google.com/webmasters/control-crawl-index/docs/robots_txt",
        "Google Developers - Robots.txt Specification",
    ),
];

const FOUND: Template = Template {
    code: "ROBOTS-0",
    summary: "robots.txt found",
    description: "Site has a valid robots.txt",
    severity: Severity::Info,
};

const NOT_FOUND: Template = Template {
    code: "ROBOTS-1",
    summary: "robots.txt not found",
    description: "Site has no robots.txt",
    severity: Severity::Medium,
};

const INVALID: Template = Template {
    code: "ROBOTS-2",
    summary: "Invalid entry found in robots.txt",
    description: "robots.txt may contain an invalid or unsupported entry.",
    severity: Severity::Medium,
};

/// `scheme://host[:port]/robots.txt` for a target URL.
pub fn robots_url(target: &str) -> Option<String> {
    let (scheme, rest) = target.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().filter(|a| !a.is_empty())?;
    Some(format!("{scheme}://{authority}/robots.txt"))
}

/// A rule line (`Allow`/`Disallow`) before the first `User-agent` is invalid.
pub fn is_valid_body(body: &str) -> bool {
    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((field, _)) = line.split_once(':') else {
            continue;
        };
        match field.trim().to_ascii_lowercase().as_str() {
            "user-agent" => return true,
            "disallow" | "allow" => return false,
            _ => {}
        }
    }
    true
}

pub struct Robots;

impl BlockingCheck for Robots {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "robots",
            name: "Robots",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        let Some(url) = robots_url(&ctx.target) else {
            return PluginOutcome::Failed(PluginFailure::new(
                FailureKind::Error,
                format!("target '{}' is not an absolute URL", ctx.target),
            ));
        };
        let response = match probe.get(&url) {
            Ok(r) => r,
            Err(e) => return PluginOutcome::Failed(PluginFailure::new(e.failure_kind(), e.to_string())),
        };

        ctx.reporter.artifact("robots.txt", response.body.clone());

        let issue = if response.status != 200 {
            NOT_FOUND.issue(&url, LINKS)
        } else {
            let plain_text = response
                .header("content-type")
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/plain"));
            if plain_text && is_valid_body(&response.body) {
                FOUND.issue(&url, LINKS)
            } else {
                INVALID.issue(&url, LINKS)
            }
        };
        PluginOutcome::Completed(vec![issue])
    }
}
