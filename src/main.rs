use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use punch_bot::attendance::Orchestrator;
use punch_bot::clock::SystemClock;
use punch_bot::config::Config;
use punch_bot::hr::{AuthExchange, HrClient};
use punch_bot::reminder::Reminder;
use punch_bot::slack::SlackClient;
use punch_bot::store::FileCredentialStore;
use punch_bot::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(FileCredentialStore::new(config.users_dir.as_str()));
    let clock = Arc::new(SystemClock);
    let responder = Arc::new(SlackClient::new(config.slack.clone())?);
    let orchestrator = Orchestrator::new(
        store.clone(),
        HrClient::new(config.hr.clone())?,
        AuthExchange::new(config.hr.clone())?,
        clock.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reminder = Reminder::new(store, responder.clone(), clock.clone());
    let reminder_task = tokio::spawn(reminder.run(shutdown_rx));

    let state = Arc::new(AppState {
        config: config.clone(),
        orchestrator,
        responder,
        clock,
    });

    let listener = TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = reminder_task.await;

    Ok(())
}
