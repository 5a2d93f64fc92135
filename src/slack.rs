use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;

use crate::config::SlackConfig;
use crate::error::{Error, Result};
use crate::types::{ApiResponse, Intent};

type HmacSha256 = Hmac<Sha256>;

/// Identifier carried by the check-in menu; button callbacks are only
/// honored when they reference it.
pub const CALLBACK_ID: &str = "punch";

pub const ACTION_IN: &str = "in";
pub const ACTION_OUT: &str = "out";
pub const ACTION_LEAVE: &str = "leave";

pub const HELP_MESSAGE: &str = "```\nUsage:\tIntegration:\n\t\tauth\n\t\tadd [emp_id] [auth_code]\n\n\tDeintegration\t\tremove\n\nCheck In:\n\t\tin```";

/// Authorization codes issued by the HR provider are always this long.
/// Counted in characters, not bytes.
const AUTH_CODE_LEN: usize = 64;

const SIGNATURE_TOLERANCE_SECS: u64 = 60 * 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Verifies the v0 request signature. Stale timestamps fail verification to
/// block replays.
pub fn verify_signature(
    signing_secret: &str,
    body: &str,
    timestamp: &str,
    signature: &str,
) -> bool {
    let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return false;
    };
    let Ok(request_timestamp) = timestamp.parse::<u64>() else {
        return false;
    };
    if elapsed.as_secs().abs_diff(request_timestamp) > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let base_string = format!("v0:{timestamp}:{body}");
    let Ok(mut mac) = HmacSha256::new_from_slice(signing_secret.as_bytes()) else {
        return false;
    };
    mac.update(base_string.as_bytes());
    let calculated = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

    calculated == signature
}

/// Derives the intent of a chat message. Pure parse, no side effects.
///
/// Attendance commands are only honored when the message arrived on the bot
/// channel (`is_direct`); `ping` and `help` work from anywhere. Malformed
/// `register`/`add` commands are parse errors so the user gets a reply
/// instead of silence.
pub fn interpret(text: &str, is_direct: bool) -> Result<Intent> {
    let text = text.trim();

    if is_direct && text == "auth" {
        return Ok(Intent::Authorize);
    }

    if is_direct && (text.starts_with("register") || text.starts_with("add")) {
        let split: Vec<&str> = text.split_whitespace().collect();
        if split.len() != 3 {
            return Err(Error::Parse("Invalid parameters.".to_string()));
        }
        let employee_id = split[1];
        let code = split[2];
        if code.chars().count() != AUTH_CODE_LEN {
            return Err(Error::Parse("Invalid authorization code.".to_string()));
        }
        return Ok(Intent::Register {
            employee_id: employee_id.to_string(),
            code: code.to_string(),
        });
    }

    if is_direct && (text == "unregister" || text == "remove") {
        return Ok(Intent::Unregister);
    }

    // These words open the button menu; the actual action is chosen there.
    if is_direct && matches!(text, "punch" | "in" | "out" | "leave") {
        return Ok(Intent::OpenCheckInMenu);
    }

    match text {
        "ping" => Ok(Intent::Ping),
        "help" => Ok(Intent::Help),
        _ => Ok(Intent::Ignore),
    }
}

impl Intent {
    /// Maps a check-in button press to its attendance operation.
    pub fn from_action(action: &str) -> Intent {
        match action {
            ACTION_IN => Intent::PunchIn,
            ACTION_OUT => Intent::PunchOut,
            ACTION_LEAVE => Intent::Leave,
            _ => Intent::Ignore,
        }
    }
}

/// Check-in menu: the current local time and the three punch buttons.
pub fn check_in_blocks(now: DateTime<FixedOffset>) -> serde_json::Value {
    json!([
        {
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": now.format("%Y/%m/%d %H:%M").to_string()
            }
        },
        {
            "type": "actions",
            "block_id": CALLBACK_ID,
            "elements": [
                {
                    "type": "button",
                    "action_id": ACTION_IN,
                    "value": ACTION_IN,
                    "text": { "type": "plain_text", "text": "Punch in" }
                },
                {
                    "type": "button",
                    "action_id": ACTION_OUT,
                    "value": ACTION_OUT,
                    "text": { "type": "plain_text", "text": "Punch out" }
                },
                {
                    "type": "button",
                    "action_id": ACTION_LEAVE,
                    "value": ACTION_LEAVE,
                    "style": "danger",
                    "text": { "type": "plain_text", "text": "Leave" }
                }
            ]
        }
    ])
}

/// Outbound message delivery. The event handlers and the reminder scheduler
/// go through this trait so tests can capture sends.
#[async_trait::async_trait]
pub trait Responder: Send + Sync {
    async fn send_text(&self, target: &str, text: &str) -> Result<()>;
    async fn send_menu(&self, target: &str, now: DateTime<FixedOffset>) -> Result<()>;
}

/// Web API client; posts via `chat.postMessage` with the bot token.
pub struct SlackClient {
    client: Client,
    config: SlackConfig,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn post_message(&self, body: serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.config.api_base))
            .bearer_auth(&self.config.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Send(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Send(format!(
                "chat.postMessage returned {}",
                response.status()
            )));
        }
        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Send(e.to_string()))?;
        if !api.ok {
            return Err(Error::Send(
                api.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Responder for SlackClient {
    async fn send_text(&self, target: &str, text: &str) -> Result<()> {
        self.post_message(json!({ "channel": target, "text": text }))
            .await
    }

    async fn send_menu(&self, target: &str, now: DateTime<FixedOffset>) -> Result<()> {
        self.post_message(json!({
            "channel": target,
            "text": "Check in",
            "blocks": check_in_blocks(now),
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE_64: &str =
        "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn auth_requires_direct_message() {
        assert_eq!(interpret("auth", true).unwrap(), Intent::Authorize);
        assert_eq!(interpret("auth", false).unwrap(), Intent::Ignore);
    }

    #[test]
    fn register_needs_exactly_three_tokens() {
        for text in [
            "register",
            "register 101",
            "add 101",
            &format!("register 101 {CODE_64} extra"),
            &format!("add 101 {CODE_64} extra"),
        ] {
            let err = interpret(text, true).unwrap_err();
            assert!(matches!(err, Error::Parse(_)), "{text}");
        }
    }

    #[test]
    fn register_code_must_be_64_characters() {
        let short = "a".repeat(63);
        let long = "a".repeat(65);
        for code in [short.as_str(), long.as_str()] {
            let err = interpret(&format!("register 101 {code}"), true).unwrap_err();
            match err {
                Error::Parse(text) => assert_eq!(text, "Invalid authorization code."),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        match interpret(&format!("register 101 {CODE_64}"), true).unwrap() {
            Intent::Register { employee_id, code } => {
                assert_eq!(employee_id, "101");
                assert_eq!(code, CODE_64);
            }
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn code_length_counts_characters_not_bytes() {
        // 64 multibyte characters, far more than 64 bytes.
        let code = "あ".repeat(64);
        match interpret(&format!("add 101 {code}"), true).unwrap() {
            Intent::Register { code: parsed, .. } => assert_eq!(parsed, code),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn add_is_an_alias_for_register() {
        assert!(matches!(
            interpret(&format!("add 101 {CODE_64}"), true).unwrap(),
            Intent::Register { .. }
        ));
    }

    #[test]
    fn unregister_and_remove_are_equivalent() {
        assert_eq!(interpret("unregister", true).unwrap(), Intent::Unregister);
        assert_eq!(interpret("remove", true).unwrap(), Intent::Unregister);
        assert_eq!(interpret("remove", false).unwrap(), Intent::Ignore);
    }

    #[test]
    fn punch_words_open_the_menu_only_in_direct_messages() {
        for text in ["punch", "in", "out", "leave"] {
            assert_eq!(interpret(text, true).unwrap(), Intent::OpenCheckInMenu);
            assert_eq!(interpret(text, false).unwrap(), Intent::Ignore);
        }
    }

    #[test]
    fn ping_and_help_work_from_anywhere() {
        for is_direct in [true, false] {
            assert_eq!(interpret("ping", is_direct).unwrap(), Intent::Ping);
            assert_eq!(interpret("help", is_direct).unwrap(), Intent::Help);
        }
    }

    #[test]
    fn chatter_is_ignored() {
        assert_eq!(interpret("good morning", true).unwrap(), Intent::Ignore);
        assert_eq!(interpret("", true).unwrap(), Intent::Ignore);
    }

    #[test]
    fn button_actions_map_to_attendance_operations() {
        assert_eq!(Intent::from_action("in"), Intent::PunchIn);
        assert_eq!(Intent::from_action("out"), Intent::PunchOut);
        assert_eq!(Intent::from_action("leave"), Intent::Leave);
        assert_eq!(Intent::from_action("cancel"), Intent::Ignore);
    }

    fn sign(secret: &str, timestamp: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("v0:{timestamp}:{body}").as_bytes());
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn signature_verification_round_trip() {
        let secret = "8f742231b10e8888abcd99yyyzzz85a5";
        let body = "payload=%7B%22type%22%3A%22block_actions%22%7D";
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string();

        let signature = sign(secret, &timestamp, body);
        assert!(verify_signature(secret, body, &timestamp, &signature));
        assert!(!verify_signature(secret, "tampered", &timestamp, &signature));
        assert!(!verify_signature("other-secret", body, &timestamp, &signature));
    }

    #[test]
    fn stale_timestamps_fail_verification() {
        let secret = "secret";
        let body = "{}";
        let stale = (SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            - SIGNATURE_TOLERANCE_SECS
            - 60)
            .to_string();

        let signature = sign(secret, &stale, body);
        assert!(!verify_signature(secret, body, &stale, &signature));
    }

    #[test]
    fn menu_blocks_carry_the_punch_actions() {
        let now = DateTime::parse_from_rfc3339("2024-06-03T09:05:00+09:00").unwrap();
        let blocks = check_in_blocks(now);

        assert_eq!(blocks[0]["text"]["text"], "2024/06/03 09:05");
        assert_eq!(blocks[1]["block_id"], CALLBACK_ID);
        let ids: Vec<&str> = blocks[1]["elements"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![ACTION_IN, ACTION_OUT, ACTION_LEAVE]);
    }
}
