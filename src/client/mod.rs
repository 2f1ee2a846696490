//! Resilient API client
//!
//! - `transport`: one request in, one response out ([`HttpTransport`] over blocking `reqwest`)
//! - `retry`: exponential backoff policy for timed-out calls
//! - `session`: the token state machine and the [`crate::core::traits::Backend`] implementation

pub mod retry;
pub mod session;
pub mod transport;

pub use retry::RetryPolicy;
pub use session::{
    ApiClient, Credentials, SessionState, TokenPair, ACCESS_COOKIE, LOGIN_PATH, REFRESH_COOKIE,
    REFRESH_PATH,
};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport, TransportError};
