//! Slack webhook 渠道测试（mockito）

use github_auditor::notification::SlackWebhookChannel;
use github_auditor::{AlertChannel, AlertMessage, SendResult, SlackSettings};
use mockito::Matcher;
use serde_json::json;

const HOOK_PATH: &str = "/services/T000/B000/XXXX";

fn settings(url: String) -> SlackSettings {
    SlackSettings {
        webhook_url: url,
        channel: "#github-alerts".to_string(),
        timeout_secs: 5,
        ..SlackSettings::default()
    }
}

fn message() -> AlertMessage {
    AlertMessage::new(
        "_Monday 02 Mar 2020 10:15:00 UTC_\nUser *alice* deleted repo *demo*.\n\n",
        "AE_1",
        "repo.destroy",
    )
}

#[test]
fn test_posts_payload() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", HOOK_PATH)
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "text": "_Monday 02 Mar 2020 10:15:00 UTC_\nUser *alice* deleted repo *demo*.\n\n",
            "username": "GitHub Auditor Bot",
            "channel": "#github-alerts",
            "icon_emoji": ":github:"
        })))
        .with_status(200)
        .with_body("ok")
        .expect(1)
        .create();

    let channel = SlackWebhookChannel::new(settings(format!("{}{}", server.url(), HOOK_PATH))).unwrap();
    assert_eq!(channel.send(&message()).unwrap(), SendResult::Sent);
    mock.assert();
}

#[test]
fn test_error_status_is_failure() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", HOOK_PATH)
        .with_status(404)
        .with_body("no_team")
        .create();

    let channel = SlackWebhookChannel::new(settings(format!("{}{}", server.url(), HOOK_PATH))).unwrap();
    match channel.send(&message()).unwrap() {
        SendResult::Failed(reason) => {
            assert!(reason.contains("404"));
            assert!(reason.contains("no_team"));
        }
        SendResult::Sent => panic!("404 must not count as sent"),
    }
}

#[test]
fn test_redirect_is_not_followed() {
    let mut server = mockito::Server::new();
    let _redirect = server
        .mock("POST", HOOK_PATH)
        .with_status(302)
        .with_header("location", "/elsewhere")
        .create();
    let elsewhere = server
        .mock("POST", "/elsewhere")
        .with_status(200)
        .expect(0)
        .create();

    let channel = SlackWebhookChannel::new(settings(format!("{}{}", server.url(), HOOK_PATH))).unwrap();
    let result = channel.send(&message()).unwrap();
    assert!(!result.is_sent());
    elsewhere.assert();
}

#[test]
fn test_unreachable_webhook_is_error() {
    let channel = SlackWebhookChannel::new(settings("http://127.0.0.1:9/hook".to_string())).unwrap();
    assert!(channel.send(&message()).is_err());
}
