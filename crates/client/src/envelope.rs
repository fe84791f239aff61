//! Request-envelope construction.
//!
//! The XML-RPC exchange has no out-of-band header channel, so authentication
//! and query-shaping metadata travel as a synthetic first parameter: a
//! structure with a single `headers` member. Caller arguments follow it
//! unmodified.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::options::{normalize_mask, RequestOptions};
use crate::session::Session;

/// Fixed header key for the object mask. Unlike the init-parameter and
/// object-filter keys it does not embed the service name.
const OBJECT_MASK_KEY: &str = "SoftLayer_ObjectMask";

/// Assemble the outbound parameter sequence for one call: the header
/// structure first, then `args` in their original order.
pub(crate) fn build_params(
    session: &Session,
    service: &str,
    options: &RequestOptions,
    args: &[Value],
) -> Result<Vec<Value>> {
    let headers = build_headers(session, service, options)?;
    let mut params = Vec::with_capacity(args.len() + 1);
    params.push(json!({ "headers": headers }));
    params.extend_from_slice(args);
    Ok(params)
}

/// Assemble the header map: authentication always, the remaining entries
/// only when the corresponding option is set and non-empty.
fn build_headers(
    session: &Session,
    service: &str,
    options: &RequestOptions,
) -> Result<Map<String, Value>> {
    let mut headers = Map::new();

    headers.insert(
        "authenticate".to_owned(),
        json!({
            "username": session.username,
            "apiKey": session.api_key,
        }),
    );

    if let Some(id) = options.id {
        headers.insert(format!("{service}InitParameters"), json!({ "id": id }));
    }

    if let Some(mask) = options.mask.as_deref().filter(|m| !m.is_empty()) {
        // Normalized again here; the wrap rule is idempotent, so masks set
        // through the option setters come through unchanged.
        let mask = normalize_mask(mask);
        headers.insert(OBJECT_MASK_KEY.to_owned(), json!({ "mask": mask }));
    }

    if let Some(filter) = options.filter.as_deref().filter(|f| !f.is_empty()) {
        let parsed: Map<String, Value> =
            serde_json::from_str(filter).map_err(Error::FilterEncoding)?;
        headers.insert(format!("{service}ObjectFilter"), Value::Object(parsed));
    }

    if let Some(limit) = options.limit {
        headers.insert(
            "resultLimit".to_owned(),
            json!({
                "limit": limit,
                "offset": options.offset.unwrap_or(0),
            }),
        );
    }

    Ok(headers)
}
