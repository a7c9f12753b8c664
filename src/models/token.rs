use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens are treated as expired this long before the provider would reject
/// them, so a request started just before expiry does not fail mid-flight.
pub const EXPIRY_LEEWAY_SECS: i64 = 60;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

// Secrets stay out of logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Valid(DateTime<Utc>),
    Expired,
    Absent,
}

impl Token {
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if now + Duration::seconds(EXPIRY_LEEWAY_SECS) < self.expires_at {
            TokenState::Valid(self.expires_at)
        } else {
            TokenState::Expired
        }
    }

    pub fn state(&self) -> TokenState {
        self.state_at(Utc::now())
    }
}

impl TokenState {
    pub fn of(token: Option<&Token>) -> Self {
        token.map(Token::state).unwrap_or(TokenState::Absent)
    }
}
