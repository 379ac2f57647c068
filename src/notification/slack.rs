//! Slack Incoming Webhook 渠道

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use super::channel::{AlertChannel, AlertMessage, SendResult};
use crate::config::SlackSettings;

/// Webhook 请求载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackPayload {
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub channel: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon_emoji: String,
}

/// Slack Webhook 渠道
#[derive(Debug)]
pub struct SlackWebhookChannel {
    client: reqwest::blocking::Client,
    settings: SlackSettings,
}

impl SlackWebhookChannel {
    /// 创建渠道
    ///
    /// 不跟随重定向：Slack 对失效的 webhook token 会返回重定向。
    pub fn new(settings: SlackSettings) -> Result<Self> {
        if settings.webhook_url.is_empty() {
            return Err(anyhow!("Slack webhook URL is required"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;

        Ok(Self { client, settings })
    }

    /// 构建载荷
    pub fn payload(&self, message: &AlertMessage) -> SlackPayload {
        SlackPayload {
            text: message.text.clone(),
            username: self.settings.username.clone(),
            channel: self.settings.channel.clone(),
            icon_emoji: self.settings.icon_emoji.clone(),
        }
    }
}

impl AlertChannel for SlackWebhookChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn send(&self, message: &AlertMessage) -> Result<SendResult> {
        let payload = self.payload(message);

        let response = self
            .client
            .post(&self.settings.webhook_url)
            .json(&payload)
            .send()
            .map_err(|e| anyhow!("Slack webhook request failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            debug!(
                channel = "slack",
                slack_channel = %self.settings.channel,
                id = %message.event_id,
                kind = %message.kind,
                "Slack webhook accepted alert"
            );
            return Ok(SendResult::Sent);
        }

        let reason = if status.is_redirection() {
            format!("Error sending message: {} (redirected, check the webhook token)", status)
        } else {
            let body = response.text().unwrap_or_default();
            format!("Error sending message: {} {}", status, body.trim())
        };
        error!(
            channel = "slack",
            id = %message.event_id,
            error = %reason,
            "Failed to send alert"
        );
        Ok(SendResult::Failed(reason.trim_end().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SlackSettings {
        SlackSettings {
            webhook_url: "http://localhost:9/hook".to_string(),
            channel: "#github-alerts".to_string(),
            ..SlackSettings::default()
        }
    }

    #[test]
    fn test_requires_webhook_url() {
        let result = SlackWebhookChannel::new(SlackSettings::default());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("webhook URL"));
    }

    #[test]
    fn test_payload_carries_identity() {
        let channel = SlackWebhookChannel::new(settings()).unwrap();
        let payload = channel.payload(&AlertMessage::new("hello", "AE_1", "repo.create"));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "hello",
                "username": "GitHub Auditor Bot",
                "channel": "#github-alerts",
                "icon_emoji": ":github:"
            })
        );
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let payload = SlackPayload {
            text: "hi".to_string(),
            username: String::new(),
            channel: String::new(),
            icon_emoji: String::new(),
        };
        assert_eq!(serde_json::to_string(&payload).unwrap(), r#"{"text":"hi"}"#);
    }
}
