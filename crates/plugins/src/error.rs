//! Plugin backend errors
//!
//! [`ProbeError`] covers a single HTTP probe. Checks turn it into a
//! [`PluginOutcome`](watchpost_core::PluginOutcome) themselves (an
//! unreachable target aborts `alive` and fails every other check), so it
//! never crosses the plugin boundary as an `Err`.

use watchpost_core::FailureKind;

/// HTTP probe errors
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Target is not a usable URL
    #[error("invalid target url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection could not be established
    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Connect or total timeout elapsed
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Target answered with a non-success status
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    /// Any other transport failure
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

impl ProbeError {
    /// Failure class recorded on the session.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Error,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let url = url.to_owned();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                reason: root_cause(err),
            }
        } else if err.is_builder() {
            Self::InvalidUrl {
                url,
                reason: root_cause(err),
            }
        } else {
            Self::Request {
                url,
                reason: root_cause(err),
            }
        }
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_display() {
        let err = ProbeError::Status {
            url: "http://localhost/".to_owned(),
            status: 503,
        };
        assert_eq!(err.to_string(), "http://localhost/ responded with status 503");
        assert_eq!(err.failure_kind(), FailureKind::Error);
    }

    #[test]
    fn timeout_maps_to_timeout_kind() {
        let err = ProbeError::Timeout {
            url: "http://slow/".to_owned(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Timeout);
    }
}
