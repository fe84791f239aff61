//! Wire-level request and response interception.

use tracing::debug;

/// Observer of raw request and response bodies.
///
/// Bodies are handed over verbatim and include the authentication header, so
/// an implementation sees credentials in the clear. Interception is
/// observational only and never alters the outcome of a call. Nothing is
/// intercepted unless an interceptor is injected on the transport or the
/// session opts in with its debug flag.
pub trait Interceptor: Send + Sync {
    /// Outbound method-call document, immediately before it is sent.
    fn on_request(&self, _service: &str, _method: &str, _body: &str) {}

    /// Inbound response document, with the HTTP status it arrived under.
    fn on_response(&self, _service: &str, _method: &str, _status: u16, _body: &str) {}

    /// Exchange failure before a response body was available. The error is
    /// also returned to the caller unchanged.
    fn on_error(&self, _service: &str, _method: &str, _error: &str) {}
}

/// Built-in interceptor logging full exchanges at debug level under the
/// `oxlayer_client::wire` target.
///
/// Selected automatically for sessions with the debug flag set when no
/// interceptor was injected on the transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireLogger;

impl Interceptor for WireLogger {
    fn on_request(&self, service: &str, method: &str, body: &str) {
        debug!(target: "oxlayer_client::wire", service, method, body, "outbound call");
    }

    fn on_response(&self, service: &str, method: &str, status: u16, body: &str) {
        debug!(target: "oxlayer_client::wire", service, method, status, body, "inbound response");
    }

    fn on_error(&self, service: &str, method: &str, error: &str) {
        debug!(target: "oxlayer_client::wire", service, method, error, "exchange failed");
    }
}
