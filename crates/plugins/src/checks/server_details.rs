//! `server-details` -- headers that expose server software.

use watchpost_core::{PluginContext, PluginOutcome, Severity, Weight};

use super::fetch_target;
use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[
    (
        "http://tools.ietf.org/html/rfc2616#section-14.38",
        "RFC 2616 - \"Server\" header",
    ),
    (
        "https://developer.mozilla.org/en-US/docs/HTTP/Headers",
        "Mozilla Developer Network - HTTP Headers",
    ),
    (
        "https://en.wikipedia.org/wiki/List_of_HTTP_header_fields",
        "Wikipedia - List of HTTP header fields",
    ),
];

/// Headers checked, in report order.
pub const HEADERS: [&str; 5] = [
    "Server",
    "X-Powered-By",
    "X-AspNet-Version",
    "X-AspNetMvc-Version",
    "X-Backend-Server",
];

const FOUND: Template = Template {
    code: "SD-0",
    summary: "'{header}' header is found",
    description: "Site has set {header} header",
    severity: Severity::Medium,
};

const NONE: Template = Template {
    code: "SD-1",
    summary: "No server-detail-type headers set",
    description: "None of the following headers is present: {headers}",
    severity: Severity::Info,
};

pub struct ServerDetails;

impl BlockingCheck for ServerDetails {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "server-details",
            name: "ServerDetails",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        let response = match fetch_target(probe, ctx) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };
        let mut issues: Vec<_> = HEADERS
            .iter()
            .filter(|h| response.has_header(h))
            .map(|h| FOUND.render(&ctx.target, LINKS, &[("header", *h)]))
            .collect();
        if issues.is_empty() {
            issues.push(NONE.render(&ctx.target, LINKS, &[("headers", HEADERS.join(", ").as_str())]));
        }
        PluginOutcome::Completed(issues)
    }
}
