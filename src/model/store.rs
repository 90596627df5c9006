pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// One page of a prefix listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    /// Opaque marker to pass back for the next page. Only meaningful when
    /// `is_truncated` is set.
    pub next_marker: Option<String>,
}
