//! Per-call query-shaping options.

/// Canonical prefix of a wrapped object mask.
const MASK_PREFIX: &str = "mask[";

/// Options attached to a single API call: object id, object mask, object
/// filter and result pagination.
///
/// Setters take the receiver by reference and return a modified copy, so a
/// base value can branch into several call-specific variants without shared
/// mutable state:
///
/// ```
/// use oxlayer_client::RequestOptions;
///
/// let base = RequestOptions::new().with_mask("id;hostname");
/// let first_page = base.with_limit(10);
/// let second_page = base.with_limit(10).with_offset(10);
/// assert_eq!(base.limit(), None);
/// assert_eq!(first_page.limit(), Some(10));
/// assert_eq!(second_page.offset(), Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub(crate) id: Option<i64>,
    pub(crate) mask: Option<String>,
    pub(crate) filter: Option<String>,
    pub(crate) limit: Option<i32>,
    pub(crate) offset: Option<i32>,
}

impl RequestOptions {
    /// Empty option set: no id, mask, filter or pagination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a single object by id.
    #[must_use]
    pub fn with_id(&self, id: i64) -> Self {
        Self { id: Some(id), ..self.clone() }
    }

    /// Restrict the properties returned with an object mask.
    ///
    /// A mask using a sub-selector (any `[`) that is not already in the
    /// canonical `mask[...]` form is wrapped. Bare property lists and
    /// pre-wrapped masks pass through unchanged.
    #[must_use]
    pub fn with_mask(&self, mask: &str) -> Self {
        Self { mask: Some(normalize_mask(mask)), ..self.clone() }
    }

    /// Attach a pre-serialized object filter, JSON text produced by a filter
    /// builder.
    ///
    /// The text is parsed and embedded as a structure at dispatch time; text
    /// that is not a JSON object fails the call with
    /// [`Error::FilterEncoding`](crate::Error::FilterEncoding).
    #[must_use]
    pub fn with_filter(&self, filter: &str) -> Self {
        Self { filter: Some(filter.to_owned()), ..self.clone() }
    }

    /// Cap the number of results returned.
    #[must_use]
    pub fn with_limit(&self, limit: i32) -> Self {
        Self { limit: Some(limit), ..self.clone() }
    }

    /// Skip `offset` results. Meaningful only together with a limit; when a
    /// limit is set and no offset is, an offset of 0 goes out on the wire.
    #[must_use]
    pub fn with_offset(&self, offset: i32) -> Self {
        Self { offset: Some(offset), ..self.clone() }
    }

    /// Object id to select, when set.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Object mask in canonical form, when set.
    pub fn mask(&self) -> Option<&str> {
        self.mask.as_deref()
    }

    /// Object filter text, when set.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Result cap, when set.
    pub fn limit(&self) -> Option<i32> {
        self.limit
    }

    /// Result offset, when set.
    pub fn offset(&self) -> Option<i32> {
        self.offset
    }
}

/// Wrap a mask containing a sub-selector in the canonical `mask[...]` form.
///
/// Applied when the mask is set and again when the envelope is built. The
/// wrapped form always starts with `mask[`, so a second application is a
/// no-op.
pub(crate) fn normalize_mask(mask: &str) -> String {
    if mask.contains('[') && !mask.starts_with(MASK_PREFIX) {
        format!("{MASK_PREFIX}{mask}]")
    } else {
        mask.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_mask_with_subselector() {
        let options = RequestOptions::new().with_mask("primaryIpAddress[id]");
        assert_eq!(options.mask(), Some("mask[primaryIpAddress[id]]"));
    }

    #[test]
    fn bare_property_list_passes_through() {
        let options = RequestOptions::new().with_mask("id;hostname;domain");
        assert_eq!(options.mask(), Some("id;hostname;domain"));
    }

    #[test]
    fn prewrapped_mask_passes_through() {
        let options = RequestOptions::new().with_mask("mask[id,hardware[id]]");
        assert_eq!(options.mask(), Some("mask[id,hardware[id]]"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_mask("item[id]");
        let twice = normalize_mask(&once);
        assert_eq!(once, "mask[item[id]]");
        assert_eq!(once, twice);
    }

    #[test]
    fn setters_leave_receiver_untouched() {
        let base = RequestOptions::new().with_mask("id");
        let derived = base.with_id(7).with_limit(50).with_filter(r#"{"id":{"operation":7}}"#);

        assert_eq!(base.id(), None);
        assert_eq!(base.limit(), None);
        assert_eq!(base.filter(), None);
        assert_eq!(derived.id(), Some(7));
        assert_eq!(derived.limit(), Some(50));
        assert_eq!(derived.mask(), Some("id"));
    }

    #[test]
    fn chained_setters_accumulate() {
        let options = RequestOptions::new()
            .with_id(1204)
            .with_mask("id;hostname")
            .with_limit(25)
            .with_offset(50);

        assert_eq!(options.id(), Some(1204));
        assert_eq!(options.mask(), Some("id;hostname"));
        assert_eq!(options.limit(), Some(25));
        assert_eq!(options.offset(), Some(50));
    }

    #[test]
    fn default_is_empty() {
        let options = RequestOptions::new();
        assert_eq!(options, RequestOptions::default());
        assert_eq!(options.id(), None);
        assert_eq!(options.mask(), None);
        assert_eq!(options.filter(), None);
        assert_eq!(options.limit(), None);
        assert_eq!(options.offset(), None);
    }
}
