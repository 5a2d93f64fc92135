use serde::{Deserialize, Serialize};

/// Stored registration binding one Slack user to one HR employee.
///
/// Serialized as one JSON document per user in the credential store; the
/// `emp_id` field name matches the documents written by earlier deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub id: String,
    #[serde(rename = "emp_id")]
    pub employee_id: String,
    pub token: OauthToken,
}

/// OAuth token material returned by the authorization exchange. Opaque to
/// the bot beyond `access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OauthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// Full work-record replacement sent on punch-in and punch-out.
#[derive(Debug, Clone, Serialize)]
pub struct WorkRecordUpdate {
    pub break_records: Vec<BreakRecord>,
    pub clock_in_at: String,
    pub clock_out_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakRecord {
    pub clock_in_at: String,
    pub clock_out_at: String,
}

/// Partial update marking the day as an absence.
#[derive(Debug, Clone, Serialize)]
pub struct AbsenceUpdate {
    pub is_absence: bool,
}

/// The slice of the upstream work record the bot reads back.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkRecordView {
    #[serde(default)]
    pub clock_in_at: Option<String>,
}

/// Normalized action derived from a chat message or a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Authorize,
    Register { employee_id: String, code: String },
    Unregister,
    OpenCheckInMenu,
    PunchIn,
    PunchOut,
    Leave,
    Ping,
    Help,
    Ignore,
}

/// Top-level Events API payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification { challenge: String },
    EventCallback { event: MessageEvent },
    #[serde(other)]
    Other,
}

/// Message event fields the bot looks at; everything else Slack sends is
/// ignored. Defaults keep non-message event kinds parseable.
#[derive(Debug, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// Interactivity requests arrive form-encoded with the JSON payload in a
/// single `payload` field.
#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub user: InteractionUser,
    /// Set on legacy `interactive_message` payloads.
    #[serde(default)]
    pub callback_id: Option<String>,
    #[serde(default)]
    pub channel: Option<InteractionChannel>,
    #[serde(default)]
    pub actions: Vec<InteractionAction>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionUser {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionChannel {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionAction {
    /// `block_actions` payloads.
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub block_id: Option<String>,
    /// Legacy `interactive_message` payloads.
    #[serde(default)]
    pub name: Option<String>,
}

/// Slack Web API response envelope; `ok: false` means the call failed even
/// when the HTTP status is 200.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}
