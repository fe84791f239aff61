//! API session: credentials, endpoint and typed dispatch.

use std::env;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::options::RequestOptions;
use crate::transport::{Transport, XmlRpcTransport};

/// Production API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.softlayer.com/xmlrpc/v3";

/// Credentials and endpoint for a set of API calls, plus the transport that
/// dispatches them.
///
/// Construct with [`Session::new`] or [`Session::from_env`] and issue calls
/// with [`Session::invoke`]. The configuration fields are plain data owned by
/// the application; cloning a session shares its transport, and with it the
/// per-service client pool.
#[derive(Clone)]
pub struct Session {
    /// Base URL; the service name is appended per call.
    pub endpoint: String,
    /// API user name.
    pub username: String,
    /// API key paired with the user name.
    pub api_key: String,
    /// Opt-in verbatim wire capture through the built-in logger. Captured
    /// request bodies include the API key, so leave this off outside
    /// troubleshooting.
    pub debug: bool,
    transport: Arc<dyn Transport>,
}

impl Session {
    /// Session for the production endpoint with a default transport.
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            username: username.into(),
            api_key: api_key.into(),
            debug: false,
            transport: Arc::new(XmlRpcTransport::new()),
        }
    }

    /// Read credentials and endpoint from the environment.
    ///
    /// `SL_USERNAME` and `SL_API_KEY` are read first, then the
    /// `SOFTLAYER_`-prefixed spellings. The endpoint comes from
    /// `SL_ENDPOINT_URL` or `SOFTLAYER_ENDPOINT_URL` and falls back to
    /// [`DEFAULT_ENDPOINT`]. Variables set to the empty string count as
    /// unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the missing variable when no
    /// username or no API key is present.
    pub fn from_env() -> Result<Self> {
        let username = env_any("SL_USERNAME", "SOFTLAYER_USERNAME")?;
        let api_key = env_any("SL_API_KEY", "SOFTLAYER_API_KEY")?;
        let endpoint = env_non_empty("SL_ENDPOINT_URL")
            .or_else(|| env_non_empty("SOFTLAYER_ENDPOINT_URL"))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
        debug!(endpoint = %endpoint, "session configured from environment");
        Ok(Self::new(username, api_key).with_endpoint(endpoint))
    }

    /// Use a different endpoint, for the private network or a test server.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Toggle verbatim wire capture through the built-in logger.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Dispatch through `transport` instead of the default XML-RPC
    /// transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Invoke `method` on `service` and deserialize the result into `T`.
    ///
    /// The call is attempted exactly once; every failure path surfaces as a
    /// typed [`Error`] and retry policy stays with the caller.
    ///
    /// # Errors
    ///
    /// [`Error::ClientSetup`] when no client could be built for the service,
    /// [`Error::FilterEncoding`] for an undecodable object filter,
    /// [`Error::Transport`] for connection and timeout failures,
    /// [`Error::Fault`] for declared API faults, and [`Error::Decode`] when
    /// the response does not fit `T`.
    pub async fn invoke<T>(
        &self,
        service: &str,
        method: &str,
        args: &[Value],
        options: &RequestOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self
            .transport
            .invoke(self, service, method, args, options)
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Decode(format!("{service}::{method} result: {e}")))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("debug", &self.debug)
            .finish()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

/// First set, non-empty variable of the two spellings.
fn env_any(primary: &str, fallback: &str) -> Result<String> {
    env_non_empty(primary)
        .or_else(|| env_non_empty(fallback))
        .ok_or_else(|| {
            Error::Config(format!(
                "missing required environment variable {primary} (or {fallback})"
            ))
        })
}
