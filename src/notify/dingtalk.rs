//! DingTalk custom-robot webhook.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::sign::dingtalk_sign;
use super::{Alert, Notifier};
use crate::config::DingTalkConfig;
use crate::error::{IntoWatchError, Result, WatchError};

const CHANNEL: &str = "dingtalk";

#[derive(Debug, Deserialize)]
struct RobotResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Posts markdown messages to a DingTalk robot.
#[derive(Debug, Clone)]
pub struct DingTalkNotifier {
    client: Client,
    url: Url,
    secret: String,
    mobiles: Vec<String>,
}

impl DingTalkNotifier {
    pub fn new(client: Client, config: &DingTalkConfig) -> Result<Self> {
        let url = Url::parse(&config.url).into_watch_notify(CHANNEL)?;
        Ok(Self {
            client,
            url,
            secret: config.secret.clone(),
            mobiles: config.mobiles.clone(),
        })
    }

    /// Webhook URL with `timestamp` and `sign` appended when a secret is set.
    pub fn signed_url(&self, timestamp_ms: i64) -> Result<Url> {
        let mut url = self.url.clone();
        if !self.secret.is_empty() {
            let sign = dingtalk_sign(&self.secret, timestamp_ms)?;
            url.query_pairs_mut()
                .append_pair("timestamp", &timestamp_ms.to_string())
                .append_pair("sign", &sign);
        }
        Ok(url)
    }

    /// Request body for `alert`.
    #[must_use]
    pub fn payload(&self, alert: &Alert) -> Value {
        let mut text = format!(
            "#### {}\n\n<font color=\"{}\">{}</font>",
            alert.title,
            alert.severity.color(),
            alert.body.replace('\n', "\n\n")
        );
        for mobile in &self.mobiles {
            text.push_str(&format!(" @{mobile}"));
        }

        json!({
            "msgtype": "markdown",
            "markdown": {
                "title": alert.title,
                "text": text,
            },
            "at": {
                "atMobiles": self.mobiles,
                "isAtAll": alert.urgent,
            },
        })
    }
}

#[async_trait]
impl Notifier for DingTalkNotifier {
    fn channel(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let url = self.signed_url(Utc::now().timestamp_millis())?;
        let response = self
            .client
            .post(url)
            .json(&self.payload(alert))
            .send()
            .await
            .into_watch_notify(CHANNEL)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::notify(CHANNEL, format!("HTTP {status}")));
        }

        let body: RobotResponse = response.json().await.into_watch_notify(CHANNEL)?;
        if body.errcode != 0 {
            return Err(WatchError::notify(
                CHANNEL,
                format!("errcode {}: {}", body.errcode, body.errmsg),
            ));
        }

        debug!(title = %alert.title, "Alert delivered to DingTalk");
        Ok(())
    }
}
