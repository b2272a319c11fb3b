//! Static table of built-in checks.
//!
//! Every built-in is a blocking check. The required set must always be
//! present; optional built-ins are enabled by id through
//! `plugins.optional` in the config.

use std::sync::Arc;

use watchpost_core::DynPlugin;

use crate::blocking::{BlockingCheck, BlockingRunner};
use crate::checks::{
    Alive, Csp, Hsts, Robots, ServerDetails, XContentTypeOptions, XFrameOptions, XXssProtection,
};
use crate::http::HttpProbe;

/// A built-in check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCheck {
    Alive,
    XFrameOptions,
    Hsts,
    XContentTypeOptions,
    XXssProtection,
    ServerDetails,
    Robots,
    Csp,
}

impl BuiltinCheck {
    /// All built-ins, required first.
    pub const ALL: [Self; 8] = [
        Self::Alive,
        Self::XFrameOptions,
        Self::Hsts,
        Self::XContentTypeOptions,
        Self::XXssProtection,
        Self::ServerDetails,
        Self::Robots,
        Self::Csp,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::XFrameOptions => "x-frame-options",
            Self::Hsts => "hsts",
            Self::XContentTypeOptions => "x-content-type-options",
            Self::XXssProtection => "x-xss-protection",
            Self::ServerDetails => "server-details",
            Self::Robots => "robots",
            Self::Csp => "csp",
        }
    }

    /// Looks a built-in up by id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    /// Required built-ins are always registered.
    pub fn required(self) -> bool {
        !matches!(self, Self::Csp)
    }

    fn check(self) -> Arc<dyn BlockingCheck> {
        match self {
            Self::Alive => Arc::new(Alive),
            Self::XFrameOptions => Arc::new(XFrameOptions),
            Self::Hsts => Arc::new(Hsts),
            Self::XContentTypeOptions => Arc::new(XContentTypeOptions),
            Self::XXssProtection => Arc::new(XXssProtection),
            Self::ServerDetails => Arc::new(ServerDetails),
            Self::Robots => Arc::new(Robots),
            Self::Csp => Arc::new(Csp),
        }
    }

    /// Plugin handle sharing `probe`.
    pub fn instantiate(self, probe: Arc<HttpProbe>) -> Arc<dyn DynPlugin> {
        Arc::new(BlockingRunner::new(self.check(), probe))
    }
}
