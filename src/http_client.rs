//! Default [`Fetch`] implementation over blocking reqwest.
//!
//! Plugin pipelines are synchronous (each script hook waits on the previous
//! fetch), so the blocking client is used directly:
//!
//! ```text
//! Request { headers, form_data, encoding }
//!      ↓  form empty?  GET : POST x-www-form-urlencoded (request charset)
//! reqwest::blocking::Client  (cookies, brotli/zstd/gzip, rustls)
//!      ↓
//! Response { body bytes, request, final URL }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::config::HttpConfig;
use crate::io::Fetch;
use crate::types::{Request, Response};

/// HTTP transport for plugins.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    /// Create a client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .cookie_store(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetch {
    #[instrument(skip(self, request), fields(url = %url))]
    fn request(&self, url: &str, request: &Request) -> Result<Response> {
        let mut builder = if request.form_data.is_empty() {
            self.client.get(url)
        } else {
            self.client
                .post(url)
                .header(
                    CONTENT_TYPE,
                    format!(
                        "application/x-www-form-urlencoded; charset={}",
                        request.encoding.name()
                    ),
                )
                .body(request.form_body())
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send()?;
        let location = response.url().to_string();
        debug!(status = %response.status(), location = %location, "Response received");

        let body = response.bytes()?.to_vec();
        Ok(Response::new(body, request.clone(), location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_custom_config() {
        let config = HttpConfig {
            user_agent: "test-agent/1.0".to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 2,
            max_redirects: 3,
        };
        assert!(HttpFetch::with_config(&config).is_ok());
    }

    #[test]
    fn null_links_never_reach_the_network() {
        let fetch = HttpFetch::new().unwrap();
        let response = fetch.call_request("NULL::offline", &Request::new()).unwrap();
        assert_eq!(response.text(), "offline");
    }
}
