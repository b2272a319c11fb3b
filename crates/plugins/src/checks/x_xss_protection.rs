//! `x-xss-protection` -- browser XSS filter header.

use watchpost_core::{PluginContext, PluginOutcome, Severity, Weight};

use super::fetch_target;
use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[(
    "http://blogs.msdn.com/b/ie/archive/2008/07/02/ie8-security-part-iv-the-xss-filter.aspx",
    "IE8 Security Part IV: The XSS Filter",
)];

const SET: Template = Template {
    code: "XXSSP-0",
    summary: "X-XSS-Protection is set properly",
    description: "Site has the following X-XSS-Protection header set: {header}",
    severity: Severity::Info,
};

const INVALID: Template = Template {
    code: "XXSSP-1",
    summary: "Invalid X-XSS-Protection header detected",
    description: "The following X-XSS-Protection header value is detected and is invalid: {header}",
    severity: Severity::High,
};

const NOT_SET: Template = Template {
    code: "XXSSP-2",
    summary: "X-XSS-Protection header is not set",
    description: "X-XSS-Protection header is not found. This header enables Cross-site scripting (XSS) filter built into most recent web browsers.",
    severity: Severity::High,
};

const DISABLED: Template = Template {
    code: "XXSSP-3",
    summary: "X-XSS-Protection header is set to disable",
    description: "X-XSS-Protection header is set to 0 and consequent disabled Cross-site-scripting (XSS) filter.",
    severity: Severity::High,
};

pub struct XXssProtection;

impl BlockingCheck for XXssProtection {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "x-xss-protection",
            name: "XXSSProtection",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        let response = match fetch_target(probe, ctx) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };
        let issue = match response.header("x-xss-protection") {
            None | Some("") => NOT_SET.issue(&ctx.target, LINKS),
            Some(value) if value.eq_ignore_ascii_case("1; mode=block") => {
                SET.render(&ctx.target, LINKS, &[("header", value)])
            }
            Some("0") => DISABLED.issue(&ctx.target, LINKS),
            Some(value) => INVALID.render(&ctx.target, LINKS, &[("header", value)]),
        };
        PluginOutcome::Completed(vec![issue])
    }
}
