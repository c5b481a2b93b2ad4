//! Query-string parsing for intercepted requests.

use std::collections::HashMap;

/// Query parameter naming the requested content type.
pub const CONTENT_TYPE_PARAM: &str = "content_type";

/// Query parameter naming the requested item count.
pub const LIMIT_PARAM: &str = "limit";

/// Item count served when a request carries no usable `limit`.
pub const DEFAULT_LIMIT: usize = 5;

/// Largest item count ever served, matching the content API's own page cap.
pub const MAX_LIMIT: usize = 1000;

/// Query parameters pulled out of a request URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    params: HashMap<String, String>,
}

impl RequestQuery {
    /// Parse the query of a full URL or request target.
    ///
    /// Everything after the last `?` is treated as the query. A URL without
    /// any `?` is parsed as a bare query string.
    pub fn from_url(url: &str) -> Self {
        let query = url.rsplit('?').next().unwrap_or("");
        Self {
            params: parse_query_string(query),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE_PARAM)
    }

    /// Requested item count, or [`DEFAULT_LIMIT`] when absent or non-numeric.
    /// Capped at [`MAX_LIMIT`]; digit strings too long for `usize` are capped
    /// too.
    pub fn limit(&self) -> usize {
        let Some(raw) = self.get(LIMIT_PARAM).map(str::trim) else {
            return DEFAULT_LIMIT;
        };
        match raw.parse::<usize>() {
            Ok(limit) => limit.min(MAX_LIMIT),
            Err(_) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => MAX_LIMIT,
            Err(_) => DEFAULT_LIMIT,
        }
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Split `a=1&b=2` into a map. Later duplicates overwrite earlier ones.
/// Values are kept exactly as they appear on the wire.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            params.insert(key.to_string(), value.to_string());
        } else {
            params.insert(part.to_string(), String::new());
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let query = RequestQuery::from_url(
            "https://cdn.contentful.com/spaces/abc/entries?access_token=t&content_type=article&limit=3",
        );
        assert_eq!(query.len(), 3);
        assert_eq!(query.get("access_token"), Some("t"));
        assert_eq!(query.content_type(), Some("article"));
        assert_eq!(query.limit(), 3);
    }

    #[test]
    fn test_last_question_mark_wins() {
        let query = RequestQuery::from_url("/a?first=1?content_type=author");
        assert_eq!(query.get("first"), None);
        assert_eq!(query.content_type(), Some("author"));
    }

    #[test]
    fn test_duplicate_keys_keep_last_value() {
        let query = RequestQuery::from_url("/entries?limit=2&limit=9");
        assert_eq!(query.len(), 1);
        assert_eq!(query.limit(), 9);
    }

    #[test]
    fn test_bare_query_string() {
        let query = RequestQuery::from_url("content_type=post&flag");
        assert_eq!(query.content_type(), Some("post"));
        assert_eq!(query.get("flag"), Some(""));
    }

    #[test]
    fn test_values_are_not_decoded() {
        let query = RequestQuery::from_url("/x?q=a%20b&r=c+d");
        assert_eq!(query.get("q"), Some("a%20b"));
        assert_eq!(query.get("r"), Some("c+d"));
    }

    #[test]
    fn test_limit_defaults() {
        assert_eq!(RequestQuery::from_url("/entries").limit(), DEFAULT_LIMIT);
        assert_eq!(RequestQuery::from_url("/entries?limit=lots").limit(), DEFAULT_LIMIT);
        assert_eq!(RequestQuery::from_url("/entries?limit=").limit(), DEFAULT_LIMIT);
        assert_eq!(RequestQuery::from_url("/entries?limit=0").limit(), 0);
    }

    #[test]
    fn test_limit_is_capped() {
        assert_eq!(RequestQuery::from_url("/entries?limit=1000").limit(), MAX_LIMIT);
        assert_eq!(RequestQuery::from_url("/entries?limit=1001").limit(), MAX_LIMIT);
        assert_eq!(
            RequestQuery::from_url("/entries?limit=18446744073709551615").limit(),
            MAX_LIMIT
        );
        assert_eq!(
            RequestQuery::from_url("/entries?limit=99999999999999999999999").limit(),
            MAX_LIMIT
        );
        assert_eq!(RequestQuery::from_url("/entries?limit=-3").limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_empty_segments_skipped() {
        let query = RequestQuery::from_url("/entries?&&a=1&");
        assert_eq!(query.len(), 1);
        assert!(!query.is_empty());
        assert!(RequestQuery::from_url("/entries?").is_empty());
    }
}
