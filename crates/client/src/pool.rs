//! Per-service client cache.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::session::Session;

/// One pooled HTTP client per remote service name.
///
/// Entries are created lazily on first use and live for the life of the pool;
/// there is no eviction and no invalidation. The pool is keyed by service
/// name only: a hit is returned even when the session endpoint or transport
/// timeout no longer match the values the entry was created with. Sessions
/// needing fresh clients get them by using a transport with a fresh pool.
///
/// Cloning is cheap and clones share the same cache.
#[derive(Debug, Clone, Default)]
pub struct ClientPool {
    clients: Arc<DashMap<String, Arc<ServiceClient>>>,
}

/// HTTP client bound to one service URL, with the timeout captured at
/// creation time.
#[derive(Debug)]
pub(crate) struct ServiceClient {
    pub(crate) url: Url,
    pub(crate) http: Client,
}

impl ClientPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached service clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True when no client has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Look up the client for `service`, creating and caching it on first
    /// use.
    ///
    /// The vacant entry holds its shard for the duration of construction, so
    /// two racing first calls for one service observe the same client. A
    /// construction failure leaves no entry behind and a later call attempts
    /// creation again.
    pub(crate) fn get_or_create(
        &self,
        service: &str,
        session: &Session,
        timeout: Duration,
    ) -> Result<Arc<ServiceClient>> {
        if let Some(client) = self.clients.get(service) {
            return Ok(Arc::clone(&client));
        }
        match self.clients.entry(service.to_owned()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let client = Arc::new(ServiceClient::create(service, session, timeout)?);
                slot.insert(Arc::clone(&client));
                debug!(service, "created pooled service client");
                Ok(client)
            }
        }
    }
}

impl ServiceClient {
    /// Build the client for one service: endpoint with the service name
    /// appended, and the per-call timeout baked into the HTTP client.
    fn create(service: &str, session: &Session, timeout: Duration) -> Result<Self> {
        let url = Url::parse(&format!("{}/{}", session.endpoint, service)).map_err(|e| {
            Error::ClientSetup {
                service: service.to_owned(),
                reason: e.to_string(),
            }
        })?;
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::ClientSetup {
                service: service.to_owned(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { url, http })
    }
}
