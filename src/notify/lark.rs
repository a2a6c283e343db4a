//! Lark (Feishu) custom-bot webhook.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::sign::lark_sign;
use super::{Alert, Notifier};
use crate::config::LarkConfig;
use crate::error::{IntoWatchError, Result, WatchError};

const CHANNEL: &str = "lark";

/// Bots answer with `code`/`msg`, `StatusCode`/`StatusMessage`, or both.
#[derive(Debug, Deserialize)]
struct BotResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default, rename = "StatusCode")]
    status_code: Option<i64>,
    #[serde(default, rename = "StatusMessage")]
    status_message: Option<String>,
}

impl BotResponse {
    /// The first non-zero code with its message, if any.
    fn failure(&self) -> Option<(i64, &str)> {
        [
            (self.code, self.msg.as_deref()),
            (self.status_code, self.status_message.as_deref()),
        ]
        .into_iter()
        .find_map(|(code, msg)| match code {
            Some(code) if code != 0 => Some((code, msg.unwrap_or_default())),
            _ => None,
        })
    }
}

/// Posts interactive cards to a Lark bot.
#[derive(Debug, Clone)]
pub struct LarkNotifier {
    client: Client,
    url: Url,
    secret: String,
}

impl LarkNotifier {
    pub fn new(client: Client, config: &LarkConfig) -> Result<Self> {
        let url = Url::parse(&config.url).into_watch_notify(CHANNEL)?;
        Ok(Self {
            client,
            url,
            secret: config.secret.clone(),
        })
    }

    /// Request body for `alert` signed at `timestamp_s`.
    pub fn payload(&self, alert: &Alert, timestamp_s: i64) -> Result<Value> {
        let content = if alert.urgent {
            format!("<at id=all></at> {}", alert.body)
        } else {
            alert.body.clone()
        };

        let mut payload = json!({
            "msg_type": "interactive",
            "card": {
                "config": { "wide_screen_mode": true },
                "header": {
                    "title": { "tag": "plain_text", "content": alert.title },
                    "template": alert.severity.color(),
                },
                "elements": [
                    { "tag": "div", "text": { "tag": "lark_md", "content": content } }
                ],
            },
        });

        if !self.secret.is_empty() {
            payload["timestamp"] = Value::String(timestamp_s.to_string());
            payload["sign"] = Value::String(lark_sign(&self.secret, timestamp_s)?);
        }

        Ok(payload)
    }
}

#[async_trait]
impl Notifier for LarkNotifier {
    fn channel(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = self.payload(alert, Utc::now().timestamp())?;
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .into_watch_notify(CHANNEL)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::notify(CHANNEL, format!("HTTP {status}")));
        }

        let body: BotResponse = response.json().await.into_watch_notify(CHANNEL)?;
        if let Some((code, msg)) = body.failure() {
            return Err(WatchError::notify(CHANNEL, format!("code {code}: {msg}")));
        }

        debug!(title = %alert.title, "Alert delivered to Lark");
        Ok(())
    }
}
