use crate::error::{Error, Result};

/// Process configuration, resolved once from the environment at startup.
/// Endpoint bases have defaults so tests can point them at local stubs.
#[derive(Debug, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    pub hr: HrConfig,
    pub users_dir: String,
    pub listen_addr: String,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub signing_secret: String,
    /// The bot channel. A message counts as bot-addressed when it arrives
    /// here; `ping` and `help` work from anywhere.
    pub channel_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct HrConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub authorize_url: String,
    pub token_url: String,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::Config(format!("{name} is not set")))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            slack: SlackConfig {
                bot_token: required("SLACK_BOT_TOKEN")?,
                signing_secret: required("SLACK_SIGNING_SECRET")?,
                channel_id: required("SLACK_CHANNEL_ID")?,
                api_base: optional("SLACK_API_BASE", "https://slack.com/api"),
            },
            hr: HrConfig {
                client_id: required("HR_CLIENT_ID")?,
                client_secret: required("HR_CLIENT_SECRET")?,
                api_base: optional("HR_API_BASE", "https://api.freee.co.jp/hr/api/v1"),
                authorize_url: optional(
                    "HR_AUTHORIZE_URL",
                    "https://secure.freee.co.jp/oauth/authorize",
                ),
                token_url: optional("HR_TOKEN_URL", "https://api.freee.co.jp/oauth/token"),
            },
            users_dir: optional("USERS_DIR", "users"),
            listen_addr: optional("LISTEN_ADDR", "0.0.0.0:3000"),
        })
    }
}
