//! Blocking HTTP probe used by the built-in checks.
//!
//! Must run on a blocking thread: the reqwest blocking client owns its own
//! runtime and panics when created or dropped inside an async context, so
//! a fresh client is built per call inside the blocking section.

use std::io::Read;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::debug;
use watchpost_core::config::HttpConfig;

use crate::error::ProbeError;

/// Upper bound on the body bytes kept from a response.
const MAX_BODY_BYTES: u64 = 512 * 1024;

/// One fetched response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    /// Body, lossily decoded and capped at 512 KiB
    pub body: String,
}

impl HttpResponse {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connect/total-timeout bounded GET.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    connect_timeout: Duration,
    request_timeout: Duration,
    user_agent: String,
}

impl HttpProbe {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Worst-case wall time of one request.
    pub fn budget(&self) -> Duration {
        self.connect_timeout + self.request_timeout
    }

    /// Fetches `url`, returning the response whatever its status.
    pub fn get(&self, url: &str) -> Result<HttpResponse, ProbeError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| ProbeError::from_reqwest(url, &e))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| ProbeError::from_reqwest(url, &e))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let mut raw = Vec::new();
        response
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut raw)
            .map_err(|e| ProbeError::Request {
                url: url.to_owned(),
                reason: format!("failed to read body: {e}"),
            })?;

        debug!(url, status, bytes = raw.len(), "probe response");
        Ok(HttpResponse {
            url: final_url,
            status,
            headers,
            body: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    /// Like [`get`](Self::get) but treats a non-2xx status as an error.
    pub fn get_ok(&self, url: &str) -> Result<HttpResponse, ProbeError> {
        let response = self.get(url)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ProbeError::Status {
                url: url.to_owned(),
                status: response.status,
            })
        }
    }
}
