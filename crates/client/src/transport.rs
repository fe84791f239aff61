//! XML-RPC dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::envelope;
use crate::error::{Error, Result};
use crate::interceptor::{Interceptor, WireLogger};
use crate::options::RequestOptions;
use crate::pool::ClientPool;
use crate::session::Session;
use crate::xmlrpc::{self, WireResponse};

/// Per-call timeout applied when the transport carries no override.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static WIRE_LOGGER: WireLogger = WireLogger;

/// A dispatch mechanism for API calls.
///
/// [`XmlRpcTransport`] is the wire implementation; stub transports implement
/// this to slot in behind [`Session`] for tests and offline tooling.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one call and return the raw decoded result value.
    ///
    /// A single attempt is made per invocation; retry policy belongs to the
    /// caller.
    async fn invoke(
        &self,
        session: &Session,
        service: &str,
        method: &str,
        args: &[Value],
        options: &RequestOptions,
    ) -> Result<Value>;
}

/// Dispatcher for the XML-RPC endpoint.
///
/// Builds the request envelope, posts the `<methodCall>` document through the
/// pooled per-service client, and decodes the `<methodResponse>`. Cheap to
/// share through an [`Arc`]; sessions cloned from one another share the
/// transport and with it the client pool.
pub struct XmlRpcTransport {
    pool: ClientPool,
    timeout: Option<Duration>,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl XmlRpcTransport {
    /// Transport with a private pool, the default timeout and no
    /// interceptor.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a transport with non-default configuration.
    pub fn builder() -> XmlRpcTransportBuilder {
        XmlRpcTransportBuilder::default()
    }

    /// The client pool backing this transport.
    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    /// Interceptor for one exchange: an injected interceptor always wins,
    /// the session debug flag opts in to the built-in wire logger, and
    /// otherwise nothing is captured.
    fn wire_interceptor(&self, session: &Session) -> Option<&dyn Interceptor> {
        match &self.interceptor {
            Some(interceptor) => Some(interceptor.as_ref()),
            None if session.debug => Some(&WIRE_LOGGER),
            None => None,
        }
    }
}

impl Default for XmlRpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for XmlRpcTransport {
    async fn invoke(
        &self,
        session: &Session,
        service: &str,
        method: &str,
        args: &[Value],
        options: &RequestOptions,
    ) -> Result<Value> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = self.pool.get_or_create(service, session, timeout)?;
        let params = envelope::build_params(session, service, options, args)?;
        let body = xmlrpc::encode_call(method, &params);

        let interceptor = self.wire_interceptor(session);
        if let Some(interceptor) = interceptor {
            interceptor.on_request(service, method, &body);
        }
        debug!(service, method, "dispatching API call");

        let response = match client
            .http
            .post(client.url.clone())
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if let Some(interceptor) = interceptor {
                    interceptor.on_error(service, method, &e.to_string());
                }
                return Err(Error::Transport(e));
            }
        };

        // Taken before the body is consumed; an error status only matters
        // when the body turns out not to carry a decodable fault.
        let status = response.status();
        let status_error = response.error_for_status_ref().err();
        let text = response.text().await.map_err(Error::Transport)?;

        if let Some(interceptor) = interceptor {
            interceptor.on_response(service, method, status.as_u16(), &text);
        }

        match (xmlrpc::decode_response(&text), status_error) {
            (Ok(WireResponse::Value(value)), _) => Ok(value),
            (Ok(WireResponse::Fault { code, message }), _) => {
                debug!(service, method, code = %code, "API returned fault");
                Err(Error::Fault { code, message })
            }
            (Err(_), Some(status_error)) => Err(Error::Transport(status_error)),
            (Err(reason), None) => Err(Error::Decode(reason)),
        }
    }
}

/// Builder for [`XmlRpcTransport`].
#[derive(Default)]
pub struct XmlRpcTransportBuilder {
    pool: Option<ClientPool>,
    timeout: Option<Duration>,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl XmlRpcTransportBuilder {
    /// Replace the 30-second default timeout for clients this transport
    /// creates. Clients already pooled keep the timeout they were created
    /// with.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Share an existing client pool instead of a private one.
    #[must_use]
    pub fn pool(mut self, pool: ClientPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Intercept every exchange with `interceptor`, regardless of the
    /// session debug flag.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Finish building the transport.
    pub fn build(self) -> XmlRpcTransport {
        XmlRpcTransport {
            pool: self.pool.unwrap_or_default(),
            timeout: self.timeout,
            interceptor: self.interceptor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl Interceptor for Silent {}

    #[test]
    fn injected_interceptor_wins_over_debug_flag() {
        let transport = XmlRpcTransport::builder()
            .interceptor(Arc::new(Silent))
            .build();

        let quiet = Session::new("u", "k");
        let noisy = Session::new("u", "k").with_debug(true);
        assert!(transport.wire_interceptor(&quiet).is_some());
        assert!(transport.wire_interceptor(&noisy).is_some());
    }

    #[test]
    fn debug_flag_opts_in_to_wire_logger() {
        let transport = XmlRpcTransport::new();

        let quiet = Session::new("u", "k");
        let noisy = Session::new("u", "k").with_debug(true);
        assert!(transport.wire_interceptor(&quiet).is_none());
        assert!(transport.wire_interceptor(&noisy).is_some());
    }

    #[test]
    fn builder_defaults() {
        let transport = XmlRpcTransport::new();
        assert_eq!(transport.timeout, None);
        assert!(transport.pool.is_empty());
        assert!(transport.interceptor.is_none());
    }

    #[test]
    fn builder_overrides_timeout_and_pool() {
        let pool = ClientPool::new();
        let transport = XmlRpcTransport::builder()
            .timeout(Duration::from_secs(5))
            .pool(pool.clone())
            .build();

        assert_eq!(transport.timeout, Some(Duration::from_secs(5)));
        let session = Session::new("u", "k").with_endpoint("http://api.test");
        let _ = transport
            .pool()
            .get_or_create("SoftLayer_Account", &session, DEFAULT_TIMEOUT)
            .unwrap();
        assert_eq!(pool.len(), 1);
    }
}
