//! `hsts` -- Strict-Transport-Security on HTTPS sites.

use std::sync::LazyLock;

use regex::Regex;
use watchpost_core::{PluginContext, PluginOutcome, Severity, Weight};

use super::fetch_target;
use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[(
    "https://developer.mozilla.org/en-US/docs/Security/HTTP_Strict_Transport_Security",
    "Mozilla Developer Network - HTTP Strict Transport Security",
)];

const SET: Template = Template {
    code: "HSTS-0",
    summary: "Strict-Transport-Security header is set properly",
    description: "Site has the following Strict-Transport-Security header set: {header}",
    severity: Severity::Info,
};

const INVALID: Template = Template {
    code: "HSTS-1",
    summary: "Invalid Strict-Transport-Security header detected",
    description: "The following Strict-Transport-Security header value is detected and is invalid: {header}",
    severity: Severity::High,
};

const NOT_SET: Template = Template {
    code: "HSTS-2",
    summary: "Strict-Transport-Security header is not set",
    description: "Strict-Transport-Security header is not found. This header is a security feature that lets a web site tell browsers that it should only be communicated with using HTTPS, instead of using HTTP.",
    severity: Severity::High,
};

const NON_HTTPS: Template = Template {
    code: "HSTS-3",
    summary: "Target is a non-HTTPS site",
    description: "Strict-Transport-Security header is only applicable on HTTPS-based site.",
    severity: Severity::Info,
};

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^max-age=(\d+)(\s)?(;)?( includeSubDomains)?$")
        .expect("hsts regex should compile")
});

/// Returns `true` when the header value has the accepted shape.
pub fn is_valid_value(value: &str) -> bool {
    HEADER.is_match(value)
}

pub struct Hsts;

impl BlockingCheck for Hsts {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "hsts",
            name: "HSTS",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        let response = match fetch_target(probe, ctx) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };
        // the final URL counts: an http target redirecting to https qualifies
        let issue = if !response.url.starts_with("https://") {
            NON_HTTPS.issue(&ctx.target, LINKS)
        } else {
            match response.header("strict-transport-security") {
                Some(value) if is_valid_value(value) => {
                    SET.render(&ctx.target, LINKS, &[("header", value)])
                }
                Some(value) => INVALID.render(&ctx.target, LINKS, &[("header", value)]),
                None => NOT_SET.issue(&ctx.target, LINKS),
            }
        };
        PluginOutcome::Completed(vec![issue])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{context, probe, serve};

    #[test]
    fn header_shapes() {
        assert!(is_valid_value("max-age=31536000"));
        assert!(is_valid_value("max-age=31536000; includeSubDomains"));
        assert!(is_valid_value("max-age=0;"));
        assert!(!is_valid_value("max-age=-1"));
        assert!(!is_valid_value("max-age=abc"));
        assert!(!is_valid_value("includeSubDomains; max-age=1"));
    }

    #[test]
    fn plain_http_site_is_informational() {
        let url = serve(
            "200 OK",
            &[("Strict-Transport-Security", "max-age=100")],
            "",
        );
        let outcome = Hsts.run(&probe(), &context(&url));
        assert_eq!(outcome.issues()[0].code, "HSTS-3");
        assert_eq!(outcome.issues()[0].severity, Severity::Info);
    }
}
