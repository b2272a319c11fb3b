//! `x-content-type-options` -- MIME sniffing protection.

use watchpost_core::{PluginContext, PluginOutcome, Severity, Weight};

use super::fetch_target;
use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[(
    "http://msdn.microsoft.com/en-us/library/ie/gg622941%28v=vs.85%29.aspx",
    "MIME-Handling Change: X-Content-Type-Options: nosniff",
)];

const SET: Template = Template {
    code: "XCTO-0",
    summary: "X-Content-Type-Options is set properly",
    description: "Site has the following X-Content-Type-Options header set: {header}",
    severity: Severity::Info,
};

const INVALID: Template = Template {
    code: "XCTO-1",
    summary: "Invalid X-Content-Type-Options header detected",
    description: "The following X-Content-Type-Options header value is detected and is invalid: {header}",
    severity: Severity::High,
};

const NOT_SET: Template = Template {
    code: "XCTO-2",
    summary: "X-Content-Type-Options header is not set",
    description: "X-Content-Type-Options header is not found. This header is a security feature that helps prevent attacks based on MIME-type confusion.",
    severity: Severity::High,
};

pub struct XContentTypeOptions;

impl BlockingCheck for XContentTypeOptions {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "x-content-type-options",
            name: "XContentTypeOptions",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        let response = match fetch_target(probe, ctx) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };
        let issue = match response.header("x-content-type-options") {
            None | Some("") => NOT_SET.issue(&ctx.target, LINKS),
            Some(value) if value.eq_ignore_ascii_case("nosniff") => {
                SET.render(&ctx.target, LINKS, &[("header", value)])
            }
            Some(value) => INVALID.render(&ctx.target, LINKS, &[("header", value)]),
        };
        PluginOutcome::Completed(vec![issue])
    }
}
