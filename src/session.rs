//! Sessions and the login callback.
//!
//! A `Session` is passed explicitly to everything that needs one; the
//! identity provider is reached through the `SessionProvider` trait so
//! the callback flow can run against a fake in tests.

use std::future::Future;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Path the browser is sent to when the code exchange fails
pub const AUTH_ERROR_PATH: &str = "/auth/auth-code-error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    pub fn from_token(token: &str) -> Self {
        Self {
            access_token: token.to_string(),
            refresh_token: None,
            user: None,
        }
    }
}

/// Exchanges an authorization code for a session
pub trait SessionProvider {
    fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> impl Future<Output = Result<Session>> + Send;
}

/// Session provider backed by the identity provider's token endpoint
pub struct HttpSessionProvider {
    http: HttpClient,
    auth_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct PkceExchange<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Deserialize)]
struct AuthErrorBody {
    #[serde(alias = "msg", alias = "error")]
    error_description: String,
}

impl HttpSessionProvider {
    pub fn new(auth_url: &str, api_key: Option<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

impl SessionProvider for HttpSessionProvider {
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<Session> {
        let url = format!("{}/token?grant_type=pkce", self.auth_url);
        let mut request = self.http.post(&url).json(&PkceExchange {
            auth_code: code,
            code_verifier: verifier,
        });
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AuthErrorBody>(&body)
                .map(|b| b.error_description)
                .unwrap_or(body);
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        let session: Session = response.json().await?;
        if session.access_token.is_empty() {
            return Err(Error::Exchange("response carried no access token".to_string()));
        }
        Ok(session)
    }
}

/// Reduce a `next` parameter to a same-origin path
///
/// Anything that does not start with a single `/` becomes `/`. Paths
/// starting with `//` or `/\` are treated as another origin by browsers.
pub fn sanitize_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") => {
            path
        }
        _ => "/",
    }
}

/// Where the login callback sends the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    /// Absolute redirect location
    pub location: String,
    /// Session established by the exchange, if it succeeded
    pub session: Option<Session>,
}

/// Handle the identity provider's redirect back to the dashboard
///
/// On success the browser goes to `origin` + sanitized `next`; a missing
/// code or a failed exchange sends it to the auth error page.
pub async fn handle_callback<P: SessionProvider>(
    provider: &P,
    origin: &str,
    code: Option<&str>,
    verifier: &str,
    next: Option<&str>,
) -> CallbackOutcome {
    let origin = origin.trim_end_matches('/');
    let failure = || CallbackOutcome {
        location: format!("{}{}", origin, AUTH_ERROR_PATH),
        session: None,
    };

    let Some(code) = code.filter(|c| !c.is_empty()) else {
        warn!("login callback without an authorization code");
        return failure();
    };

    match provider.exchange_code(code, verifier).await {
        Ok(session) => {
            let path = sanitize_next(next);
            info!(
                user = session.user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
                next = path,
                "exchanged authorization code"
            );
            CallbackOutcome {
                location: format!("{}{}", origin, path),
                session: Some(session),
            }
        }
        Err(err) => {
            warn!(error = %err, "authorization code exchange failed");
            failure()
        }
    }
}
