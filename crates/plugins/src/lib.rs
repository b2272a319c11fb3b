//! Watchpost plugins -- execution backends and built-in checks.
//!
//! Two backends implement the [`Plugin`](watchpost_core::Plugin) contract:
//!
//! - [`BlockingRunner`]: synchronous [`BlockingCheck`]s on tokio's blocking
//!   pool, bounded by the HTTP probe's budget
//! - [`ExternalProcessPlugin`]: a separate program speaking a JSON-lines
//!   protocol, bounded by its own timeout
//!
//! [`BuiltinCheck`] is the static table of checks shipped with watchpost.

pub mod blocking;
pub mod builtin;
pub mod checks;
pub mod error;
pub mod external;
pub mod http;
pub mod report;

pub use blocking::{BlockingCheck, BlockingRunner, CheckInfo, panic_message};
pub use builtin::BuiltinCheck;
pub use error::ProbeError;
pub use external::ExternalProcessPlugin;
pub use http::{HttpProbe, HttpResponse};
