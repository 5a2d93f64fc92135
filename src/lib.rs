//! Slack bot that records attendance against an HR work-record service and
//! reminds registered users to check in.

pub mod attendance;
pub mod clock;
pub mod config;
pub mod error;
pub mod hr;
pub mod reminder;
pub mod slack;
pub mod store;
pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::attendance::Orchestrator;
use crate::clock::Clock;
use crate::config::Config;
use crate::slack::Responder;
use crate::types::{EventEnvelope, Intent, InteractionForm, InteractionPayload, MessageEvent};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub orchestrator: Orchestrator,
    pub responder: Arc<dyn Responder>,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/slack/interactions", post(slack_interactions))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn verified(state: &AppState, headers: &HeaderMap, body: &str) -> bool {
    let signature = headers
        .get("X-Slack-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let timestamp = headers
        .get("X-Slack-Request-Timestamp")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    slack::verify_signature(&state.config.slack.signing_secret, body, timestamp, signature)
}

/// Events API callback. Acks immediately; the actual work runs in a spawned
/// task so Slack never waits on the HR service.
async fn slack_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    if !verified(&state, &headers, &body) {
        return (StatusCode::UNAUTHORIZED, String::new());
    }

    let envelope: EventEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("unreadable event payload: {e}");
            return (StatusCode::BAD_REQUEST, String::new());
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => (StatusCode::OK, challenge),
        EventEnvelope::EventCallback { event } => {
            tokio::spawn(async move {
                handle_message(state, event).await;
            });
            (StatusCode::OK, String::new())
        }
        EventEnvelope::Other => (StatusCode::OK, String::new()),
    }
}

/// Interactivity callback: button presses from the check-in menu.
async fn slack_interactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    if !verified(&state, &headers, &body) {
        return StatusCode::UNAUTHORIZED;
    }

    let form: InteractionForm = match serde_urlencoded::from_str(&body) {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("unreadable interaction body: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };
    let payload: InteractionPayload = match serde_json::from_str(&form.payload) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("unreadable interaction payload: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    tokio::spawn(async move {
        handle_interaction(state, payload).await;
    });
    StatusCode::OK
}

async fn handle_message(state: Arc<AppState>, event: MessageEvent) {
    if event.kind != "message" {
        return;
    }
    // The bot's own posts come back as events; answering them would loop.
    if event.bot_id.is_some() || event.subtype.as_deref() == Some("bot_message") {
        return;
    }

    let is_direct = event.channel == state.config.slack.channel_id;
    match slack::interpret(&event.text, is_direct) {
        Ok(intent) => dispatch(&state, intent, &event.user, &event.channel).await,
        Err(e) => reply(&state, &event.channel, &e.user_message()).await,
    }
}

async fn handle_interaction(state: Arc<AppState>, payload: InteractionPayload) {
    let Some(action) = payload
        .actions
        .first()
        .and_then(|a| a.action_id.as_deref().or(a.name.as_deref()))
    else {
        return;
    };

    // Only the check-in menu posts interactive elements.
    let from_menu = payload.callback_id.as_deref() == Some(slack::CALLBACK_ID)
        || payload
            .actions
            .first()
            .and_then(|a| a.block_id.as_deref())
            == Some(slack::CALLBACK_ID);
    if !from_menu {
        return;
    }

    let target = payload
        .channel
        .as_ref()
        .map(|c| c.id.clone())
        .unwrap_or_else(|| payload.user.id.clone());
    let intent = Intent::from_action(action);
    dispatch(&state, intent, &payload.user.id, &target).await;
}

/// Executes one intent and reports the outcome back to the user.
async fn dispatch(state: &AppState, intent: Intent, user_id: &str, channel: &str) {
    match intent {
        Intent::Authorize => {
            let text = format!(
                "Please open the following URL in your browser:\n{}",
                state.orchestrator.auth_url()
            );
            reply(state, channel, &text).await;
        }
        Intent::Register { employee_id, code } => {
            match state.orchestrator.register(user_id, &employee_id, &code).await {
                Ok(()) => {
                    reply(state, channel, ":ok: Saved your access token successfully.").await
                }
                Err(e) => {
                    tracing::error!("register failed for {user_id}: {e}");
                    reply(state, channel, &e.user_message()).await;
                }
            }
        }
        Intent::Unregister => match state.orchestrator.unregister(user_id).await {
            Ok(()) => {
                reply(
                    state,
                    channel,
                    &format!(":ok: '{user_id}' was removed successfully."),
                )
                .await
            }
            Err(e) => {
                tracing::warn!("unregister failed for {user_id}: {e}");
                reply(state, channel, &format!(":warning: Failed to remove '{user_id}'.")).await;
            }
        },
        Intent::OpenCheckInMenu => {
            // The menu goes to the user as a direct message, wherever the
            // triggering word was typed.
            if let Err(e) = state.responder.send_menu(user_id, state.clock.now()).await {
                tracing::error!("failed to open check-in menu for {user_id}: {e}");
            }
        }
        Intent::PunchIn => {
            report(
                state,
                channel,
                state.orchestrator.punch_in(user_id).await,
                ":ok: Punched in.",
            )
            .await
        }
        Intent::PunchOut => {
            report(
                state,
                channel,
                state.orchestrator.punch_out(user_id).await,
                ":ok: Punched out.",
            )
            .await
        }
        Intent::Leave => {
            report(
                state,
                channel,
                state.orchestrator.leave(user_id).await,
                ":ok: Recorded today as a leave day.",
            )
            .await
        }
        Intent::Ping => reply(state, channel, "pong").await,
        Intent::Help => reply(state, channel, slack::HELP_MESSAGE).await,
        Intent::Ignore => {}
    }
}

async fn report(state: &AppState, channel: &str, result: error::Result<()>, ok_text: &str) {
    match result {
        Ok(()) => reply(state, channel, ok_text).await,
        Err(e) => {
            tracing::error!("attendance operation failed: {e}");
            reply(state, channel, &e.user_message()).await;
        }
    }
}

async fn reply(state: &AppState, channel: &str, text: &str) {
    if let Err(e) = state.responder.send_text(channel, text).await {
        tracing::error!("failed to post message: {e}");
    }
}
