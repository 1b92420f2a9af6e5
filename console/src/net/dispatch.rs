//! Request dispatch boundary.
//!
//! ERROR HANDLING
//! ==============
//! Every call resolves to success or a typed [`ApiError`]. A 401 on a
//! protected call clears the stored session and routes to
//! [`Route::Login`](crate::state::route::Route) before the error is returned;
//! public account calls (login, register, reset) treat 401 like any other
//! server rejection so a bad password shows the server's message.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ConsoleConfig;
use crate::state::route::{Navigator, Route};
use crate::state::session::{Session, SessionError, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A protected call was attempted while signed out.
    #[error("not signed in")]
    MissingSession,
    /// The backend rejected the bearer token.
    #[error("session expired or rejected by the server")]
    Unauthorized,
    /// Non-success status other than a protected 401.
    #[error("server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file is {size} bytes; the upload limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },
}

impl ApiError {
    /// True when the caller must sign in again.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::MissingSession)
    }

    /// One-line user-facing notice: the server's own message when it sent
    /// one, otherwise `fallback`.
    #[must_use]
    pub fn notice(&self, fallback: &str) -> String {
        match self {
            Self::Server { message: Some(message), .. } => message.clone(),
            Self::MissingSession | Self::Unauthorized | Self::FileTooLarge { .. } | Self::File { .. } => {
                self.to_string()
            }
            _ => fallback.to_owned(),
        }
    }
}

/// A request ready to send, tagged with whether it carries credentials.
pub struct Prepared {
    request: RequestBuilder,
    method: Method,
    path: String,
    protected: bool,
}

impl Prepared {
    /// Add a body, query, or headers to the underlying request.
    #[must_use]
    pub fn with(mut self, f: impl FnOnce(RequestBuilder) -> RequestBuilder) -> Self {
        self.request = f(self.request);
        self
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    sessions: Arc<dyn SessionStore>,
    navigator: Navigator,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &ConsoleConfig,
        sessions: Arc<dyn SessionStore>,
        navigator: Navigator,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            sessions,
            navigator,
        })
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Current session. When signed out, routes to login and fails.
    ///
    /// # Errors
    ///
    /// [`ApiError::MissingSession`] when signed out, or a session store error.
    pub fn session(&self) -> Result<Session, ApiError> {
        match self.sessions.load()? {
            Some(session) => Ok(session),
            None => {
                self.navigator.redirect_to_login();
                Err(ApiError::MissingSession)
            }
        }
    }

    /// Navigate, diverting protected views to login when signed out.
    pub fn navigate(&self, route: Route) -> Route {
        let signed_in = matches!(self.sessions.load(), Ok(Some(_)));
        self.navigator.navigate(route, signed_in)
    }

    /// Unauthenticated call with the standard timeout.
    #[must_use]
    pub fn public(&self, method: Method, path: &str) -> Prepared {
        let request = self.http.request(method.clone(), self.url(path)).timeout(self.request_timeout);
        Prepared { request, method, path: path.to_owned(), protected: false }
    }

    /// Authenticated call with the standard timeout.
    ///
    /// # Errors
    ///
    /// [`ApiError::MissingSession`] when signed out.
    pub fn protected(&self, method: Method, path: &str) -> Result<Prepared, ApiError> {
        let prepared = self.protected_transfer(method, path)?;
        let timeout = self.request_timeout;
        Ok(prepared.with(|request| request.timeout(timeout)))
    }

    /// Authenticated call without a total timeout, for file transfers.
    ///
    /// # Errors
    ///
    /// [`ApiError::MissingSession`] when signed out.
    pub fn protected_transfer(&self, method: Method, path: &str) -> Result<Prepared, ApiError> {
        let session = self.session()?;
        let request = self.http.request(method.clone(), self.url(path)).bearer_auth(&session.token);
        Ok(Prepared { request, method, path: path.to_owned(), protected: true })
    }

    /// Send and decode a JSON body.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; [`ApiError::Decode`] if the body is not the expected shape.
    pub async fn json<T: DeserializeOwned>(&self, prepared: Prepared) -> Result<T, ApiError> {
        let path = prepared.path.clone();
        let response = self.send(prepared).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|error| {
            warn!(%path, error = %error, "response body did not decode");
            ApiError::Decode(format!("{path}: {error}"))
        })
    }

    /// Send and return the raw body.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn bytes(&self, prepared: Prepared) -> Result<Vec<u8>, ApiError> {
        let response = self.send(prepared).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn send(&self, prepared: Prepared) -> Result<Response, ApiError> {
        let Prepared { request, method, path, protected } = prepared;
        debug!(%method, %path, protected, "dispatching request");

        let response = request.send().await?;
        let status = response.status();

        if protected && status == StatusCode::UNAUTHORIZED {
            self.expire_session(&path);
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = server_message(&body);
            warn!(%method, %path, status = status.as_u16(), message = message.as_deref().unwrap_or(""), "request rejected");
            return Err(ApiError::Server { status: status.as_u16(), message });
        }
        Ok(response)
    }

    fn expire_session(&self, path: &str) {
        if let Err(error) = self.sessions.clear() {
            warn!(error = %error, "failed to clear rejected session");
        }
        self.navigator.redirect_to_login();
        warn!(%path, "session rejected; routed to login");
    }
}

/// `message` field of a JSON error body, if present and non-empty.
fn server_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
