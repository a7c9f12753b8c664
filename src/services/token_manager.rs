use crate::config::{Config, Credentials};
use crate::error::{AuthError, ProviderError};
use crate::models::{SessionId, Token, TokenState};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredToken {
    token: Token,
    /// Authorization code this token was issued for, kept so a redelivered
    /// callback can be recognized without hitting the provider again
    redeemed_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    #[serde(default)]
    scope: String,
}

impl TokenResponse {
    /// Absolute expiry for a provider-supplied lifetime. Lifetimes that are
    /// not positive or that overflow the clock are a malformed response.
    fn expires_at(&self) -> Result<DateTime<Utc>, AuthError> {
        Some(self.expires_in)
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                ProviderError::MalformedResponse(format!(
                    "token response: unusable expires_in {}",
                    self.expires_in
                ))
                .into()
            })
    }
}

/// OAuth error code the accounts service uses for a rejected or reused grant
const INVALID_GRANT: &str = "invalid_grant";

/// Owns the OAuth2 authorization-code flow and the per-session token cache.
/// Nothing else reads or writes tokens.
pub struct TokenManager {
    credentials: Credentials,
    authorize_url: Url,
    token_url: String,
    client: Client,
    store: RwLock<HashMap<SessionId, StoredToken>>,
}

impl TokenManager {
    pub fn new(config: &Config, client: Client) -> anyhow::Result<Self> {
        let credentials = config.credentials.clone();
        let authorize_url = Url::parse_with_params(
            &format!("{}/authorize", config.accounts_url),
            &[
                ("client_id", credentials.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", credentials.redirect_uri.as_str()),
                ("scope", credentials.scope.as_str()),
            ],
        )
        .with_context(|| format!("Invalid SPOTIFY_ACCOUNTS_URL: {}", config.accounts_url))?;

        Ok(Self {
            credentials,
            authorize_url,
            token_url: format!("{}/api/token", config.accounts_url),
            client,
            store: RwLock::new(HashMap::new()),
        })
    }

    /// Provider authorization URL. Depends only on the credentials.
    pub fn get_authorize_url(&self) -> Url {
        self.authorize_url.clone()
    }

    /// Exchange a one-time authorization code for a token and cache it for
    /// `session`. The cache is only written once the provider response is
    /// fully parsed, so a failed exchange leaves any previous token intact.
    pub async fn exchange_code_for_token(
        &self,
        session: SessionId,
        code: &str,
    ) -> Result<Token, AuthError> {
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        // Redelivered callback for a code we already redeemed
        {
            let store = self.store.read().await;
            if let Some(stored) = store.get(&session) {
                if stored.redeemed_code.as_deref() == Some(code)
                    && matches!(stored.token.state(), TokenState::Valid(_))
                {
                    tracing::debug!("Session {} already redeemed this code, reusing token", session);
                    return Ok(stored.token.clone());
                }
            }
        }

        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .await
            .map_err(|e| match e {
                AuthError::Provider(ProviderError::Remote { status: 400, ref message })
                    if is_invalid_grant(message) =>
                {
                    tracing::warn!("Authorization code rejected: {}", message);
                    AuthError::InvalidCode
                }
                other => other,
            })?;

        let token = Token {
            expires_at: response.expires_at()?,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            scope: response.scope,
        };

        // Concurrent exchanges for one session race here; the last write wins
        self.store.write().await.insert(
            session,
            StoredToken {
                token: token.clone(),
                redeemed_code: Some(code.to_string()),
            },
        );
        tracing::info!("Session {} authenticated, token valid until {}", session, token.expires_at);

        Ok(token)
    }

    /// Cached token for `session`, without any expiry check
    pub async fn get_cached_token(&self, session: SessionId) -> Option<Token> {
        self.store
            .read()
            .await
            .get(&session)
            .map(|stored| stored.token.clone())
    }

    pub async fn token_state(&self, session: SessionId) -> TokenState {
        let store = self.store.read().await;
        TokenState::of(store.get(&session).map(|stored| &stored.token))
    }

    /// Access token to use for the next Web API call. Expired tokens are
    /// refreshed first; if that fails the session is logged out.
    pub async fn valid_access_token(&self, session: SessionId) -> Result<String, AuthError> {
        let (state, access_token) = {
            let store = self.store.read().await;
            match store.get(&session) {
                Some(stored) => (stored.token.state(), stored.token.access_token.clone()),
                None => (TokenState::Absent, String::new()),
            }
        };

        match state {
            TokenState::Valid(_) => Ok(access_token),
            TokenState::Absent => Err(AuthError::NotAuthenticated),
            TokenState::Expired => match self.refresh(session).await {
                Ok(token) => Ok(token.access_token),
                Err(e) => {
                    tracing::warn!("Token refresh for session {} failed: {}", session, e);
                    self.settle_failed_refresh(session, &access_token).await
                }
            },
        }
    }

    /// A concurrent request may have refreshed (and rotated the refresh
    /// token) or the user may have logged in again while this refresh was in
    /// flight. Only the token that failed is evicted; a newer valid one wins.
    async fn settle_failed_refresh(
        &self,
        session: SessionId,
        failed_access_token: &str,
    ) -> Result<String, AuthError> {
        let mut store = self.store.write().await;
        let current = store
            .get(&session)
            .map(|stored| (stored.token.access_token.clone(), stored.token.state()));

        match current {
            Some((access_token, _)) if access_token == failed_access_token => {
                store.remove(&session);
                Err(AuthError::Expired)
            }
            Some((access_token, TokenState::Valid(_))) => {
                tracing::debug!("Session {} was refreshed concurrently, using newer token", session);
                Ok(access_token)
            }
            _ => Err(AuthError::Expired),
        }
    }

    /// Trade the stored refresh token for a new access token
    pub async fn refresh(&self, session: SessionId) -> Result<Token, AuthError> {
        let refresh_token = self
            .store
            .read()
            .await
            .get(&session)
            .and_then(|stored| stored.token.refresh_token.clone())
            .ok_or(AuthError::Expired)?;

        tracing::debug!("Refreshing access token for session {}", session);

        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await?;

        let expires_at = response.expires_at()?;
        let mut store = self.store.write().await;
        // Logged out while the refresh was in flight
        let stored = store.get_mut(&session).ok_or(AuthError::NotAuthenticated)?;

        let scope = if response.scope.is_empty() {
            stored.token.scope.clone()
        } else {
            response.scope
        };
        stored.token = Token {
            access_token: response.access_token,
            // Spotify only sometimes rotates the refresh token
            refresh_token: response.refresh_token.or(Some(refresh_token)),
            expires_at,
            scope,
        };

        Ok(stored.token.clone())
    }

    /// Drop the session's token. Returns whether one was cached.
    pub async fn forget(&self, session: SessionId) -> bool {
        self.store.write().await.remove(&session).is_some()
    }

    /// Drop the session's token only if it is still `access_token`. A token
    /// stored after the caller read it is left alone. Returns whether it was
    /// removed.
    pub async fn forget_if_current(&self, session: SessionId, access_token: &str) -> bool {
        let mut store = self.store.write().await;
        let is_current = store
            .get(&session)
            .is_some_and(|stored| stored.token.access_token == access_token);
        if is_current {
            store.remove(&session);
        }
        is_current
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::classify(status.as_u16(), &body).into());
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::MalformedResponse(format!("token response: {}", e)).into()
        })
    }

    #[cfg(test)]
    pub(crate) async fn insert_token(&self, session: SessionId, token: Token) {
        self.store.write().await.insert(
            session,
            StoredToken {
                token,
                redeemed_code: None,
            },
        );
    }
}

/// Classified OAuth messages read `error` or `error: description`
fn is_invalid_grant(message: &str) -> bool {
    message
        .split(':')
        .next()
        .is_some_and(|code| code.trim() == INVALID_GRANT)
}
