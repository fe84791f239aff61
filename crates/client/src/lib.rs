//! Client for the SoftLayer XML-RPC API.
//!
//! This crate is the transport core that typed service wrappers call into:
//! [`Session`] carries credentials and endpoint, [`RequestOptions`] shapes a
//! call (object id, object mask, object filter and pagination), and
//! [`XmlRpcTransport`] turns one invocation into one XML-RPC exchange with
//! the request envelope first and positional arguments after it.
//!
//! ```no_run
//! use oxlayer_client::{RequestOptions, Session};
//! use serde_json::Value;
//!
//! # async fn run() -> oxlayer_client::Result<()> {
//! let session = Session::from_env()?;
//! let options = RequestOptions::new().with_mask("id;companyName");
//! let account: Value = session
//!     .invoke("SoftLayer_Account", "getObject", &[], &options)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Calls are never retried here. Match on [`Error`] variants, or use
//! [`Error::is_timeout`] and [`Error::fault_code`], to drive caller-side
//! retry policy.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

mod envelope;
mod error;
mod interceptor;
mod options;
mod pool;
mod session;
mod transport;
mod xmlrpc;

pub use error::{Error, Result};
pub use interceptor::{Interceptor, WireLogger};
pub use options::RequestOptions;
pub use pool::ClientPool;
pub use session::{Session, DEFAULT_ENDPOINT};
pub use transport::{Transport, XmlRpcTransport, XmlRpcTransportBuilder, DEFAULT_TIMEOUT};
