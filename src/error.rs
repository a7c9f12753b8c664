use crate::views::{self, View};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization code")]
    MissingCode,

    #[error("Authorization code was rejected by the provider")]
    InvalidCode,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired, please log in again")]
    Expired,

    #[error("Network failure talking to the accounts service: {0}")]
    NetworkFailure(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("At least one seed track is required")]
    MissingSeeds,

    #[error("Too many seeds: {count} given, at most {max} allowed")]
    TooManySeeds { count: usize, max: usize },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid genre seed: {0}")]
    InvalidGenre(String),

    #[error("Invalid track id: {0}")]
    InvalidTrackId(String),

    #[error("Malformed form input: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Spotify rejected the access token: {0}")]
    Unauthorized(String),

    #[error("Spotify refused the request: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Spotify rate limit reached, try again shortly")]
    RateLimited,

    #[error("Spotify returned status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected response from Spotify: {0}")]
    MalformedResponse(String),

    #[error("Request to Spotify failed: {0}")]
    Transport(String),
}

/// Error payloads come in two shapes: the Web API nests an object under
/// `error`, the accounts service uses a flat OAuth error string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Api {
        error: ApiErrorObject,
    },
    OAuth {
        error: String,
        error_description: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ApiErrorObject {
    message: Option<String>,
}

impl ProviderError {
    /// Classify a non-success provider response. Shared by the token and Web
    /// API clients so every handler sees the same taxonomy.
    pub fn classify(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody::Api { error }) => error.message.unwrap_or_default(),
            Ok(ErrorBody::OAuth {
                error,
                error_description,
            }) => match error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            },
            Err(_) => body.chars().take(200).collect(),
        };

        match status {
            401 => ProviderError::Unauthorized(message),
            403 => ProviderError::Forbidden(message),
            404 => ProviderError::NotFound(message),
            429 => ProviderError::RateLimited,
            _ => ProviderError::Remote { status, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::MalformedResponse(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Auth(ref e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            AppError::Validation(ref e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Provider(ref e) => {
                tracing::warn!("Provider error: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Error response for HTML routes. Authentication problems send the browser
/// back to the login page, everything else renders the error view.
#[derive(Debug)]
pub struct ErrorPage(pub AppError);

impl From<AppError> for ErrorPage {
    fn from(e: AppError) -> Self {
        ErrorPage(e)
    }
}

impl From<AuthError> for ErrorPage {
    fn from(e: AuthError) -> Self {
        ErrorPage(e.into())
    }
}

impl From<ValidationError> for ErrorPage {
    fn from(e: ValidationError) -> Self {
        ErrorPage(e.into())
    }
}

impl From<ProviderError> for ErrorPage {
    fn from(e: ProviderError) -> Self {
        ErrorPage(e.into())
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AppError::Auth(ref e) => {
                tracing::debug!("Redirecting to login: {}", e);
                return Redirect::to("/login").into_response();
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Provider(ProviderError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider(ref e) => {
                tracing::warn!("Provider error: {}", e);
                StatusCode::BAD_GATEWAY
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = self.0.to_string();
        (status, views::render(View::Error { message: &message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_web_api_error_body() {
        let body = r#"{"error":{"status":401,"message":"The access token expired"}}"#;
        assert_eq!(
            ProviderError::classify(401, body),
            ProviderError::Unauthorized("The access token expired".to_string())
        );
    }

    #[test]
    fn test_classify_oauth_error_body() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#;
        assert_eq!(
            ProviderError::classify(400, body),
            ProviderError::Remote {
                status: 400,
                message: "invalid_grant: Invalid authorization code".to_string()
            }
        );
    }

    #[test]
    fn test_classify_rate_limit_and_not_found() {
        assert_eq!(ProviderError::classify(429, ""), ProviderError::RateLimited);
        assert!(matches!(
            ProviderError::classify(404, r#"{"error":{"status":404,"message":"non existing id"}}"#),
            ProviderError::NotFound(ref m) if m == "non existing id"
        ));
    }

    #[test]
    fn test_classify_unparseable_body_is_truncated() {
        let body = "x".repeat(1000);
        match ProviderError::classify(503, &body) {
            ProviderError::Remote { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message.len(), 200);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_app_error_status_codes() {
        let auth = AppError::from(AuthError::NotAuthenticated).into_response();
        assert_eq!(auth.status(), StatusCode::UNAUTHORIZED);

        let validation = AppError::from(ValidationError::MissingSeeds).into_response();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let provider = AppError::from(ProviderError::RateLimited).into_response();
        assert_eq!(provider.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_page_redirects_on_auth_error() {
        let response = ErrorPage::from(AuthError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }

    #[test]
    fn test_error_page_status_codes() {
        let provider = ErrorPage::from(ProviderError::Transport("timeout".into())).into_response();
        assert_eq!(provider.status(), StatusCode::BAD_GATEWAY);

        let limited = ErrorPage::from(ProviderError::RateLimited).into_response();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        let validation = ErrorPage::from(ValidationError::MissingSeeds).into_response();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_hides_details() {
        let json = AppError::from(anyhow::anyhow!("cookie header rejected")).into_response();
        assert_eq!(json.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let page = ErrorPage(anyhow::anyhow!("cookie header rejected").into()).into_response();
        assert_eq!(page.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
