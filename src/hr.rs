use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;

use crate::config::HrConfig;
use crate::error::{Error, Result};
use crate::types::{AbsenceUpdate, OauthToken, WorkRecordUpdate, WorkRecordView};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Out-of-band flow: the user pastes the code back into chat.
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Client for the HR work-record API. One record per employee per day,
/// addressed by date.
pub struct HrClient {
    client: Client,
    config: HrConfig,
}

impl HrClient {
    pub fn new(config: HrConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn record_url(&self, employee_id: &str, date: NaiveDate) -> String {
        format!(
            "{}/employees/{}/work_records/{}",
            self.config.api_base,
            employee_id,
            date.format("%Y-%m-%d")
        )
    }

    pub async fn get_record(
        &self,
        token: &OauthToken,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<WorkRecordView> {
        let response = self
            .client
            .get(self.record_url(employee_id, date))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))
    }

    /// Full replacement of the day's record.
    pub async fn put_record(
        &self,
        token: &OauthToken,
        employee_id: &str,
        date: NaiveDate,
        update: &WorkRecordUpdate,
    ) -> Result<()> {
        let response = self
            .client
            .put(self.record_url(employee_id, date))
            .bearer_auth(&token.access_token)
            .json(update)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(())
    }

    /// Partial update; only the absence flag is sent, other fields keep
    /// their upstream values.
    pub async fn patch_record(
        &self,
        token: &OauthToken,
        employee_id: &str,
        date: NaiveDate,
        update: &AbsenceUpdate,
    ) -> Result<()> {
        let response = self
            .client
            .put(self.record_url(employee_id, date))
            .bearer_auth(&token.access_token)
            .json(update)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(())
    }
}

async fn upstream_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Upstream(format!("{status}: {body}"))
}

/// OAuth authorization-code exchange against the HR provider.
pub struct AuthExchange {
    client: Client,
    config: HrConfig,
}

impl AuthExchange {
    pub fn new(config: HrConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// URL the user opens in a browser to obtain an authorization code.
    /// Pure string construction, no network.
    pub fn auth_url(&self) -> String {
        let query = serde_urlencoded::to_string([
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
        ])
        .unwrap_or_default();
        format!("{}?{}", self.config.authorize_url, query)
    }

    pub async fn exchange(&self, code: &str) -> Result<OauthToken> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::AuthExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AuthExchange(format!("{status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| Error::AuthExchange(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HrConfig {
        HrConfig {
            client_id: "the-client".to_string(),
            client_secret: "the-secret".to_string(),
            api_base: "https://hr.example/api/v1".to_string(),
            authorize_url: "https://hr.example/oauth/authorize".to_string(),
            token_url: "https://hr.example/oauth/token".to_string(),
        }
    }

    #[test]
    fn auth_url_carries_client_and_oob_redirect() {
        let auth = AuthExchange::new(config()).unwrap();
        let url = auth.auth_url();
        assert!(url.starts_with("https://hr.example/oauth/authorize?"));
        assert!(url.contains("client_id=the-client"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob"));
        assert!(!url.contains("the-secret"));
    }

    #[test]
    fn record_url_is_keyed_by_employee_and_date() {
        let hr = HrClient::new(config()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(
            hr.record_url("101", date),
            "https://hr.example/api/v1/employees/101/work_records/2024-06-03"
        );
    }
}
