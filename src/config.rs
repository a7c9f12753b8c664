use std::env;
use std::time::Duration;

/// OAuth client identity registered with Spotify. Loaded once at startup and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Base URL of the accounts service (authorize + token endpoints)
    pub accounts_url: String,
    /// Base URL of the Web API, including the version segment
    pub api_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Applied to every outbound request
    pub http_timeout: Duration,
    pub session_cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "{} environment variable must be set. \
                        Create an app at https://developer.spotify.com/dashboard to obtain one",
                        key
                    )
                })
        };
        let optional = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let credentials = Credentials {
            client_id: required("SPOTIFY_CLIENT_ID")?,
            client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            redirect_uri: optional("SPOTIFY_REDIRECT_URI", "http://localhost:5001/callback"),
            scope: optional("SPOTIFY_SCOPE", "user-top-read"),
        };

        reqwest::Url::parse(&credentials.redirect_uri).map_err(|e| {
            anyhow::anyhow!(
                "SPOTIFY_REDIRECT_URI is not a valid URL ({}): {}",
                credentials.redirect_uri,
                e
            )
        })?;

        let server_port = optional("SERVER_PORT", "5001")
            .parse()
            .map_err(|e| anyhow::anyhow!("SERVER_PORT must be a port number: {}", e))?;

        let timeout_secs: u64 = optional("HTTP_TIMEOUT_SECS", "10")
            .parse()
            .map_err(|e| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a whole number: {}", e))?;
        if timeout_secs == 0 {
            return Err(anyhow::anyhow!("HTTP_TIMEOUT_SECS must be greater than zero"));
        }

        Ok(Config {
            credentials,
            accounts_url: optional("SPOTIFY_ACCOUNTS_URL", "https://accounts.spotify.com")
                .trim_end_matches('/')
                .to_string(),
            api_url: optional("SPOTIFY_API_URL", "https://api.spotify.com/v1")
                .trim_end_matches('/')
                .to_string(),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port,
            http_timeout: Duration::from_secs(timeout_secs),
            session_cookie_secure: optional("SESSION_COOKIE_SECURE", "false")
                .eq_ignore_ascii_case("true"),
        })
    }
}
