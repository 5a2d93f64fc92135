use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid command: {0}")]
    Parse(String),

    #[error("no registration found for {0}")]
    NotFound(String),

    #[error("authorization exchange failed: {0}")]
    AuthExchange(String),

    #[error("attendance service request failed: {0}")]
    Upstream(String),

    #[error("credential store failure: {0}")]
    Persist(String),

    #[error("could not enumerate registered users: {0}")]
    Enumeration(String),

    #[error("message delivery failed: {0}")]
    Send(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Chat reply shown to the user whose command triggered the failure.
    /// Details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Parse(text) => text.clone(),
            Error::NotFound(_) => {
                ":warning: No registration found. Send `register [emp_id] [auth_code]` first."
                    .to_string()
            }
            Error::AuthExchange(_) => {
                ":warning: Authorization failed. Check the code and try again.".to_string()
            }
            Error::Upstream(_) => {
                ":warning: The attendance service rejected the request.".to_string()
            }
            Error::Persist(_) => ":warning: Could not save your registration.".to_string(),
            Error::Enumeration(_) | Error::Send(_) | Error::Config(_) => {
                ":warning: Something went wrong. Please try again later.".to_string()
            }
        }
    }
}
