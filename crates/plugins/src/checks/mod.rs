//! Built-in header and policy checks.
//!
//! Each check performs a single GET (robots.txt fetches `/robots.txt` of
//! the target's origin instead). Except for [`alive::Alive`], a failed
//! request or a non-2xx answer fails the session without aborting the
//! scan.

pub mod alive;
pub mod csp;
pub mod hsts;
pub mod robots;
pub mod server_details;
pub mod x_content_type_options;
pub mod x_frame_options;
pub mod x_xss_protection;

use tracing::debug;
use watchpost_core::{PluginContext, PluginFailure, PluginOutcome};

use crate::http::{HttpProbe, HttpResponse};

pub use alive::Alive;
pub use csp::Csp;
pub use hsts::Hsts;
pub use robots::Robots;
pub use server_details::ServerDetails;
pub use x_content_type_options::XContentTypeOptions;
pub use x_frame_options::XFrameOptions;
pub use x_xss_protection::XXssProtection;

/// GETs the target, mapping any probe error to a failed outcome.
pub(crate) fn fetch_target(
    probe: &HttpProbe,
    ctx: &PluginContext,
) -> Result<HttpResponse, PluginOutcome> {
    probe.get_ok(&ctx.target).map_err(|e| {
        debug!(target_url = %ctx.target, error = %e, "target request failed");
        PluginOutcome::Failed(PluginFailure::new(e.failure_kind(), e.to_string()))
    })
}
