//! `x-frame-options` -- clickjacking protection header.

use std::sync::LazyLock;

use regex::Regex;
use watchpost_core::{PluginContext, PluginOutcome, Severity, Weight};

use super::fetch_target;
use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[(
    "https://developer.mozilla.org/en-US/docs/HTTP/X-Frame-Options",
    "Mozilla Developer Network - The X-Frame-Options response header",
)];

const SET: Template = Template {
    code: "XFO-0",
    summary: "X-Frame-Options header is set properly",
    description: "Site has the following X-Frame-Options set: {header}",
    severity: Severity::Info,
};

const INVALID: Template = Template {
    code: "XFO-1",
    summary: "Invalid X-Frame-Options header detected",
    description: "The following X-Frame-Options header value is detected and is invalid: {header}",
    severity: Severity::High,
};

const NOT_SET: Template = Template {
    code: "XFO-2",
    summary: "X-Frame-Options header is not set",
    description: "X-Frame-Options header is not found. Sites can use this to avoid clickjacking attacks, by ensuring that their content is not embedded into other sites.",
    severity: Severity::High,
};

/// `ALLOW-FROM <scheme>://<host>[:port][/path]`, no query or fragment.
static ALLOW_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^ALLOW-FROM\s+https?://[^\s/?#:]+(:\d+)?(/[^\s?#]*)?$")
        .expect("allow-from regex should compile")
});

pub struct XFrameOptions;

/// Returns `true` for DENY, SAMEORIGIN or a strict ALLOW-FROM origin.
pub fn is_valid_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.eq_ignore_ascii_case("DENY")
        || trimmed.eq_ignore_ascii_case("SAMEORIGIN")
        || ALLOW_FROM.is_match(trimmed)
}

impl BlockingCheck for XFrameOptions {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "x-frame-options",
            name: "XFrameOptions",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        let response = match fetch_target(probe, ctx) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };
        let issue = match response.header("x-frame-options") {
            Some(value) if is_valid_value(value) => {
                SET.render(&ctx.target, LINKS, &[("header", value)])
            }
            Some(value) => INVALID.render(&ctx.target, LINKS, &[("header", value)]),
            None => NOT_SET.issue(&ctx.target, LINKS),
        };
        PluginOutcome::Completed(vec![issue])
    }
}
