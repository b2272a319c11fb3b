//! `alive` -- is the target reachable at all?
//!
//! Meant as the first step of a plan: anything but a 2xx answer reports a
//! Fatal issue and aborts the rest of the scan.

use watchpost_core::{PluginContext, PluginOutcome, Severity, Weight};

use crate::blocking::{BlockingCheck, CheckInfo};
use crate::http::HttpProbe;
use crate::report::Template;

const LINKS: &[(&str, &str)] = &[(
    "http://www.w3.org/Protocols/rfc2616/rfc2616-sec10.html",
    "W3C - Status Code Definitions",
)];

const REACHABLE: Template = Template {
    code: "ALIVE-0",
    summary: "Site is reachable",
    description: "The server has responded with {status} status code. This indicates the site is reachable.",
    severity: Severity::Info,
};

const UNREACHABLE: Template = Template {
    code: "ALIVE-1",
    summary: "Site could not be reached",
    description: "{reason}",
    severity: Severity::Fatal,
};

pub struct Alive;

impl BlockingCheck for Alive {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            id: "alive",
            name: "Alive",
            version: "0.1",
            weight: Weight::Light,
        }
    }

    fn run(&self, probe: &HttpProbe, ctx: &PluginContext) -> PluginOutcome {
        match probe.get_ok(&ctx.target) {
            Ok(response) => {
                let status = response.status.to_string();
                PluginOutcome::Completed(vec![REACHABLE.render(
                    &ctx.target,
                    LINKS,
                    &[("status", status.as_str())],
                )])
            }
            Err(e) => {
                let reason = e.to_string();
                PluginOutcome::Aborted(vec![UNREACHABLE.render(
                    &ctx.target,
                    LINKS,
                    &[("reason", reason.as_str())],
                )])
            }
        }
    }
}
