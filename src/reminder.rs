use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};

use crate::clock::Clock;
use crate::error::Result;
use crate::slack::Responder;
use crate::store::CredentialStore;

/// How often the scheduler wakes up to look at the wall clock.
pub const TICK_INTERVAL: Duration = Duration::from_secs(40 * 60);

/// Local hours at which every registered user gets the check-in menu.
pub const REMINDER_HOURS: [u32; 2] = [9, 17];

/// Time-driven check-in prompts. Runs alongside the event-driven path for
/// the lifetime of the process.
pub struct Reminder {
    store: Arc<dyn CredentialStore>,
    responder: Arc<dyn Responder>,
    clock: Arc<dyn Clock>,
}

impl Reminder {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        responder: Arc<dyn Responder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            responder,
            clock,
        }
    }

    /// Ticks until the shutdown channel flips. A failed tick is logged and
    /// the loop moves on to the next one.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = self.clock.now();
                    match self.tick(now).await {
                        Ok(sent) if sent > 0 => {
                            tracing::info!("sent {sent} check-in reminders");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!("reminder tick failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("reminder scheduler stopping");
                    return;
                }
            }
        }
    }

    /// Prompts every registered user when the local hour matches a reminder
    /// hour. Returns the number of delivered prompts. Per-user delivery
    /// failures are logged and the fan-out continues.
    pub async fn tick(&self, now: DateTime<FixedOffset>) -> Result<usize> {
        if !REMINDER_HOURS.contains(&now.hour()) {
            return Ok(0);
        }

        let users = self.store.list_all().await?;
        let mut sent = 0;
        let mut failed = 0;
        for user_id in &users {
            match self.responder.send_menu(user_id, now).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!("check-in reminder to {user_id} failed: {e}");
                }
            }
        }
        if failed > 0 {
            tracing::warn!("{failed} of {} check-in reminders failed", users.len());
        }
        Ok(sent)
    }
}
