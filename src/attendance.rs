use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};

use crate::clock::Clock;
use crate::error::Result;
use crate::hr::{AuthExchange, HrClient};
use crate::store::CredentialStore;
use crate::types::{AbsenceUpdate, UserCredential, WorkRecordUpdate};

/// Clock-out written on punch-in; the real one replaces it at punch-out.
const DEFAULT_CLOCK_OUT_HOUR: u32 = 18;

/// Executes attendance operations against the credential store and the HR
/// service. Stateless between calls; credentials are re-read every time.
pub struct Orchestrator {
    store: Arc<dyn CredentialStore>,
    hr: HrClient,
    auth: AuthExchange,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hr: HrClient,
        auth: AuthExchange,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hr,
            auth,
            clock,
        }
    }

    pub fn auth_url(&self) -> String {
        self.auth.auth_url()
    }

    /// Exchanges the authorization code and persists the resulting
    /// credential, replacing any existing registration for the user.
    pub async fn register(&self, user_id: &str, employee_id: &str, code: &str) -> Result<()> {
        let token = self.auth.exchange(code).await?;
        let credential = UserCredential {
            id: user_id.to_string(),
            employee_id: employee_id.to_string(),
            token,
        };
        self.store.put(&credential).await
    }

    pub async fn unregister(&self, user_id: &str) -> Result<()> {
        self.store.delete(user_id).await
    }

    /// Writes today's record with clock-in now and the default clock-out.
    pub async fn punch_in(&self, user_id: &str) -> Result<()> {
        let credential = self.store.get(user_id).await?;
        let now = self.clock.now();
        let clock_out = now
            .date_naive()
            .and_hms_opt(DEFAULT_CLOCK_OUT_HOUR, 0, 0)
            .unwrap()
            .and_local_timezone(now.timezone())
            .unwrap();

        let update = WorkRecordUpdate {
            break_records: Vec::new(),
            clock_in_at: now.to_rfc3339(),
            clock_out_at: clock_out.to_rfc3339(),
        };
        self.hr
            .put_record(
                &credential.token,
                &credential.employee_id,
                now.date_naive(),
                &update,
            )
            .await
    }

    /// Reads today's record, repairs the clock-in if the upstream value is
    /// missing or inconsistent, and writes the record back with clock-out
    /// now.
    pub async fn punch_out(&self, user_id: &str) -> Result<()> {
        let credential = self.store.get(user_id).await?;
        let now = self.clock.now();
        let today = now.date_naive();

        let record = self
            .hr
            .get_record(&credential.token, &credential.employee_id, today)
            .await?;
        let clock_in = repair_clock_in(now, record.clock_in_at.as_deref());

        let update = WorkRecordUpdate {
            break_records: Vec::new(),
            clock_in_at: clock_in.to_rfc3339(),
            clock_out_at: now.to_rfc3339(),
        };
        self.hr
            .put_record(&credential.token, &credential.employee_id, today, &update)
            .await
    }

    /// Marks today as an absence.
    pub async fn leave(&self, user_id: &str) -> Result<()> {
        let credential = self.store.get(user_id).await?;
        let today = self.clock.now().date_naive();
        self.hr
            .patch_record(
                &credential.token,
                &credential.employee_id,
                today,
                &AbsenceUpdate { is_absence: true },
            )
            .await
    }
}

/// Produces a usable clock-in for the outgoing record despite missing or
/// inconsistent upstream data.
///
/// The upstream record has no clock-in when the user never punched in, and
/// can hold an instant in the future when the service stored a UTC value
/// where a +09:00 value belongs. A missing value becomes one minute before
/// the clock-out; a future value is pulled back by the nine-hour regional
/// offset; any other parsed value is kept unchanged. An unparseable value is
/// treated as missing.
pub fn repair_clock_in(
    now: DateTime<FixedOffset>,
    upstream: Option<&str>,
) -> DateTime<FixedOffset> {
    match upstream.map(DateTime::parse_from_rfc3339) {
        Some(Ok(clock_in)) if clock_in > now => now - Duration::hours(9),
        Some(Ok(clock_in)) => clock_in,
        Some(Err(_)) | None => now - Duration::minutes(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-03T19:21:00+09:00").unwrap()
    }

    #[test]
    fn missing_clock_in_becomes_one_minute_before_now() {
        let repaired = repair_clock_in(now(), None);
        assert_eq!(repaired, now() - Duration::minutes(1));
    }

    #[test]
    fn future_clock_in_is_pulled_back_nine_hours() {
        let future = (now() + Duration::minutes(5)).to_rfc3339();
        let repaired = repair_clock_in(now(), Some(&future));
        assert_eq!(repaired, now() - Duration::hours(9));
    }

    #[test]
    fn past_clock_in_is_kept_unchanged() {
        let past = now() - Duration::minutes(30);
        let repaired = repair_clock_in(now(), Some(&past.to_rfc3339()));
        assert_eq!(repaired, past);
    }

    #[test]
    fn clock_in_equal_to_now_is_kept() {
        let repaired = repair_clock_in(now(), Some(&now().to_rfc3339()));
        assert_eq!(repaired, now());
    }

    #[test]
    fn future_instant_in_another_offset_still_counts_as_future() {
        // Same wall-clock digits in UTC are nine hours ahead of +09:00.
        let utc_labelled = "2024-06-03T19:21:00+00:00";
        let repaired = repair_clock_in(now(), Some(utc_labelled));
        assert_eq!(repaired, now() - Duration::hours(9));
    }

    #[test]
    fn garbage_clock_in_is_treated_as_missing() {
        let repaired = repair_clock_in(now(), Some("not a timestamp"));
        assert_eq!(repaired, now() - Duration::minutes(1));
    }
}
