//! Resilient API client
//!
//! [`ApiClient`] owns the session token pair and drives it through three
//! states:
//!
//! ```text
//! Unauthenticated --login--> Authenticated --401--> Renewing --ok--> Authenticated
//!                                                       \--fail--> Unauthenticated (fatal)
//! ```
//!
//! Every call goes through the same loop:
//!
//! - timeouts are retried with exponential backoff up to the policy's attempt
//!   ceiling, then surface as [`FinesError::Timeout`]
//! - a 401 triggers at most one renewal and one replay; a second 401 is fatal
//! - in soft mode, 404 and 422 bodies are handed back as data
//!
//! The client never touches caller records; the only state it mutates is its
//! own token pair.

use crate::client::retry::RetryPolicy;
use crate::client::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use crate::core::traits::Backend;
use crate::types::{FinesError, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Login endpoint; tokens come back as cookies
pub const LOGIN_PATH: &str = "/authn/login-with-expiry";

/// Refresh endpoint; takes the refresh cookie, returns a new pair
pub const REFRESH_PATH: &str = "/authn/refresh";

pub const ACCESS_COOKIE: &str = "folioAccessToken";
pub const REFRESH_COOKIE: &str = "folioRefreshToken";

/// Statuses handed back as data in soft mode
const SOFT_STATUSES: [u16; 2] = [404, 422];

/// Username and password for the login call
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Access token plus the refresh token that can renew it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    /// Absent when the backend did not issue one; renewal then logs in again
    pub refresh: Option<String>,
}

impl TokenPair {
    fn from_response(response: &ApiResponse) -> Option<Self> {
        let access = response.cookies.get(ACCESS_COOKIE)?.clone();
        Some(TokenPair {
            access,
            refresh: response.cookies.get(REFRESH_COOKIE).cloned(),
        })
    }
}

/// Where the client is in its token lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(TokenPair),
    /// A refresh exchange is in flight for this pair
    Renewing(TokenPair),
}

/// How error statuses are treated for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallMode {
    Strict,
    Soft,
}

/// Session-aware client over any [`Transport`]
#[derive(Debug)]
pub struct ApiClient<T> {
    transport: T,
    credentials: Credentials,
    retry: RetryPolicy,
    state: SessionState,
    renewals: u32,
}

impl<T: Transport> ApiClient<T> {
    /// Create an unauthenticated client
    pub fn new(transport: T, credentials: Credentials, retry: RetryPolicy) -> Self {
        ApiClient {
            transport,
            credentials,
            retry,
            state: SessionState::Unauthenticated,
            renewals: 0,
        }
    }

    /// Create a client and log in immediately
    ///
    /// # Errors
    ///
    /// Returns `LoginFailed` if the backend does not issue an access token.
    pub fn connect(transport: T, credentials: Credentials, retry: RetryPolicy) -> Result<Self> {
        let mut client = ApiClient::new(transport, credentials, retry);
        client.login()?;
        Ok(client)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Number of renewals performed so far
    pub fn renewals(&self) -> u32 {
        self.renewals
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Post credentials and store the issued token pair
    ///
    /// Login is never retried: any failure is returned immediately and leaves
    /// the client unauthenticated.
    pub fn login(&mut self) -> Result<()> {
        info!("Logging in to backend as {}", self.credentials.username);
        self.state = SessionState::Unauthenticated;

        let request = ApiRequest::new(Method::Post, LOGIN_PATH).with_body(json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        }));

        let response = self
            .transport
            .send(&request)
            .map_err(|e| FinesError::login_failed(None, e.to_string()))?;

        if !response.is_success() {
            return Err(FinesError::login_failed(
                Some(response.status),
                response.body.to_string(),
            ));
        }

        let tokens = TokenPair::from_response(&response).ok_or_else(|| {
            FinesError::login_failed(
                Some(response.status),
                format!("response carried no {} cookie", ACCESS_COOKIE),
            )
        })?;

        self.state = SessionState::Authenticated(tokens);
        info!("Login successful");
        Ok(())
    }

    /// Exchange the refresh token for a new pair
    ///
    /// On failure the client drops to `Unauthenticated` and the error is fatal;
    /// renewal itself is never retried.
    pub fn renew(&mut self) -> Result<()> {
        let current = match std::mem::replace(&mut self.state, SessionState::Unauthenticated) {
            SessionState::Authenticated(pair) | SessionState::Renewing(pair) => pair,
            SessionState::Unauthenticated => {
                return Err(FinesError::renewal_failed(None, "no session to renew"));
            }
        };
        self.renewals += 1;

        let refresh = match current.refresh.clone() {
            Some(token) => token,
            None => {
                info!("No refresh token issued; renewing by logging in again");
                self.state = SessionState::Renewing(current);
                return self
                    .login()
                    .map_err(|e| FinesError::renewal_failed(None, e.to_string()));
            }
        };

        info!("Renewing access token");
        self.state = SessionState::Renewing(current.clone());
        let request = ApiRequest::new(Method::Post, REFRESH_PATH).with_cookie(REFRESH_COOKIE, &refresh);

        let outcome = match self.transport.send(&request) {
            Ok(response) if response.is_success() => match TokenPair::from_response(&response) {
                Some(mut pair) => {
                    if pair.refresh.is_none() {
                        pair.refresh = current.refresh;
                    }
                    Ok(pair)
                }
                None => Err(FinesError::renewal_failed(
                    Some(response.status),
                    format!("response carried no {} cookie", ACCESS_COOKIE),
                )),
            },
            Ok(response) => Err(FinesError::renewal_failed(
                Some(response.status),
                response.body.to_string(),
            )),
            Err(e) => Err(FinesError::renewal_failed(None, e.to_string())),
        };

        match outcome {
            Ok(pair) => {
                self.state = SessionState::Authenticated(pair);
                info!("Access token renewed");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Unauthenticated;
                Err(e)
            }
        }
    }

    fn access_token(&mut self) -> Result<String> {
        if self.state == SessionState::Unauthenticated {
            self.login()?;
        }
        match &self.state {
            SessionState::Authenticated(pair) | SessionState::Renewing(pair) => {
                Ok(pair.access.clone())
            }
            SessionState::Unauthenticated => Err(FinesError::login_failed(None, "no session")),
        }
    }

    /// Send with timeout retries; other transport failures are returned at once
    fn send_with_retry(&mut self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 1;
        loop {
            match self.transport.send(request) {
                Ok(response) => return Ok(response),
                Err(TransportError::Timeout) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "{} {} timed out (attempt {}/{}), retrying in {:?}",
                        request.method, request.path, attempt, self.retry.max_attempts, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(TransportError::Timeout) => {
                    return Err(FinesError::timeout(
                        request.method.as_str(),
                        &request.path,
                        attempt,
                    ));
                }
                Err(TransportError::Failed(message)) => {
                    return Err(FinesError::transport(format!(
                        "{} {}: {}",
                        request.method, request.path, message
                    )));
                }
            }
        }
    }

    fn call(&mut self, method: Method, path: &str, body: Option<&Value>, mode: CallMode) -> Result<Value> {
        let mut renewed = false;
        loop {
            let token = self.access_token()?;
            let mut request = ApiRequest::new(method, path).with_cookie(ACCESS_COOKIE, &token);
            if let Some(body) = body {
                request = request.with_body(body.clone());
            }

            debug!("{} {}", method, path);
            let response = self.send_with_retry(&request)?;

            match response.status {
                status if (200..300).contains(&status) => {
                    if let Some(errors) = response.body.get("errors") {
                        warn!("{} {} returned errors: {}", method, path, errors);
                    }
                    return Ok(response.body);
                }
                401 if !renewed => {
                    warn!("{} {} returned 401, renewing session", method, path);
                    self.renew()?;
                    renewed = true;
                }
                401 => return Err(FinesError::unauthorized(method.as_str(), path)),
                status if mode == CallMode::Soft && SOFT_STATUSES.contains(&status) => {
                    debug!("{} {} returned {} (soft mode)", method, path, status);
                    return Ok(response.body);
                }
                status => {
                    return Err(FinesError::http_status(
                        method.as_str(),
                        path,
                        status,
                        response.body.to_string(),
                    ));
                }
            }
        }
    }
}

impl<T: Transport> Backend for ApiClient<T> {
    fn get(&mut self, path: &str) -> Result<Value> {
        self.call(Method::Get, path, None, CallMode::Strict)
    }

    fn post(&mut self, path: &str, body: &Value) -> Result<Value> {
        self.call(Method::Post, path, Some(body), CallMode::Strict)
    }

    fn post_soft(&mut self, path: &str, body: &Value) -> Result<Value> {
        self.call(Method::Post, path, Some(body), CallMode::Soft)
    }

    fn delete(&mut self, path: &str) -> Result<Value> {
        self.call(Method::Delete, path, None, CallMode::Strict)
    }
}
