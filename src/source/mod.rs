//! Where the current height comes from.

pub mod path;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use tracing::debug;

use crate::config::NodeCheckConfig;
use crate::error::{IntoWatchError, Result, WatchError};

/// Request timeout when the config does not set one.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability to read the node's current height.
#[async_trait]
pub trait HeightSource: Send + Sync {
    /// Returns the current height as an opaque string.
    ///
    /// # Errors
    ///
    /// [`WatchError::Fetch`] or [`WatchError::MissingHeight`]; the caller
    /// must not touch the history when this fails.
    async fn fetch_height(&self) -> Result<String>;
}

/// Fetches the height with a single HTTP request and a JSON path lookup.
#[derive(Debug, Clone)]
pub struct HttpHeightSource {
    client: Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: String,
    json_path: String,
}

impl HttpHeightSource {
    pub fn from_config(config: &NodeCheckConfig) -> Result<Self> {
        let method = Method::from_bytes(config.method.trim().to_uppercase().as_bytes())
            .map_err(|_| WatchError::InvalidConfig {
                field: "node_check.method".into(),
                reason: format!("'{}' is not an HTTP method", config.method),
            })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                WatchError::InvalidConfig {
                    field: format!("node_check.headers.{name}"),
                    reason: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| WatchError::InvalidConfig {
                field: format!("node_check.headers.{name}"),
                reason: e.to_string(),
            })?;
            headers.insert(name, value);
        }

        let timeout = config
            .timeout_s
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .into_watch_fetch()?;

        Ok(Self {
            client,
            method,
            url: config.url.clone(),
            headers,
            body: config.body.clone(),
            json_path: config.height_json_path.clone(),
        })
    }

    /// Equivalent curl invocation, for reproducing a failing check by hand.
    #[must_use]
    pub fn curl_command(&self) -> String {
        let mut parts = vec![
            "curl".to_string(),
            "-X".to_string(),
            self.method.to_string(),
            shell_quote(&self.url),
        ];
        for (name, value) in &self.headers {
            parts.push("-H".to_string());
            parts.push(shell_quote(&format!(
                "{}: {}",
                name,
                value.to_str().unwrap_or_default()
            )));
        }
        if !self.body.is_empty() {
            parts.push("-d".to_string());
            parts.push(shell_quote(&self.body));
        }
        parts.join(" ")
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[async_trait]
impl HeightSource for HttpHeightSource {
    async fn fetch_height(&self) -> Result<String> {
        debug!(curl = %self.curl_command(), "Fetching height");

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        if !self.body.is_empty() {
            request = request.body(self.body.clone());
        }

        let response = request.send().await.into_watch_fetch()?;
        let status = response.status();
        let text = response.text().await.into_watch_fetch()?;
        debug!(status = %status, body = %text, "Height response");

        if !status.is_success() {
            return Err(WatchError::fetch(format!("HTTP {status} from {}", self.url)));
        }

        path::extract(&text, &self.json_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn node_check(extra: &str) -> NodeCheckConfig {
        Config::from_toml(&format!(
            r#"
[node_check]
check_interval_s = 60
url = "http://127.0.0.1:26657"
height_json_path = "result.sync_info.latest_block_height"
{extra}
"#
        ))
        .expect("parse")
        .node_check
    }

    #[test]
    fn test_curl_command_for_get() {
        let source = HttpHeightSource::from_config(&node_check("")).unwrap();
        assert_eq!(source.curl_command(), "curl -X GET 'http://127.0.0.1:26657'");
    }

    #[test]
    fn test_curl_command_includes_headers_and_body() {
        let source = HttpHeightSource::from_config(&node_check(
            r#"
method = "post"
body = "{\"method\":\"status\",\"tag\":\"it's\"}"

[node_check.headers]
Content-Type = "application/json"
"#,
        ))
        .unwrap();

        let curl = source.curl_command();
        assert!(curl.starts_with("curl -X POST 'http://127.0.0.1:26657'"));
        assert!(curl.contains("-H 'content-type: application/json'"));
        assert!(curl.contains(r#"-d '{"method":"status","tag":"it'\''s"}'"#));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let err = HttpHeightSource::from_config(&node_check(r#"method = "GE T""#)).unwrap_err();
        assert!(matches!(err, WatchError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_fetch_error() {
        let mut config = node_check("timeout_s = 2");
        config.url = "http://127.0.0.1:1".into();
        let source = HttpHeightSource::from_config(&config).unwrap();

        let err = source.fetch_height().await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch { .. }));
    }
}
