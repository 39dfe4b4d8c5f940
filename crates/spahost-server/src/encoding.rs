//! Accept-Encoding negotiation.
//!
//! Only brotli and gzip participate; other codings (`deflate`, `zstd`) are
//! ignored. A `*` token short-circuits to the full set. At the call site
//! brotli is always preferred over gzip when both are allowed.

use http::header::ACCEPT_ENCODING;
use http::HeaderMap;

/// A set of content encodings, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodingSet(u8);

impl EncodingSet {
    /// The empty set: serve uncompressed.
    pub const NONE: Self = Self(0);
    /// Gzip coding.
    pub const GZIP: Self = Self(1);
    /// Brotli coding.
    pub const BROTLI: Self = Self(2);
    /// Both codings.
    pub const ALL: Self = Self(1 | 2);

    /// Adds the encodings of `other` to this set.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Returns `true` if the set contains brotli.
    #[must_use]
    pub fn contains_brotli(self) -> bool {
        self.0 & Self::BROTLI.0 != 0
    }

    /// Returns `true` if the set contains gzip.
    #[must_use]
    pub fn contains_gzip(self) -> bool {
        self.0 & Self::GZIP.0 != 0
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// The client's negotiated accepted encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptEncoding {
    accepted: EncodingSet,
}

impl AcceptEncoding {
    /// Resolves the accepted encodings from all `Accept-Encoding` headers.
    ///
    /// Each header value is split on commas with whitespace-trimmed tokens.
    /// `*` short-circuits to the full set; unknown tokens are ignored.
    #[must_use]
    pub fn resolve(headers: &HeaderMap) -> Self {
        let mut accepted = EncodingSet::NONE;
        for value in headers.get_all(ACCEPT_ENCODING) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for token in value.split(',') {
                match token.trim() {
                    "*" => return Self {
                        accepted: EncodingSet::ALL,
                    },
                    "br" => accepted.insert(EncodingSet::BROTLI),
                    "gzip" => accepted.insert(EncodingSet::GZIP),
                    _ => {}
                }
            }
        }

        Self { accepted }
    }

    /// Returns `true` if the client accepts brotli.
    #[must_use]
    pub fn allows_brotli(self) -> bool {
        self.accepted.contains_brotli()
    }

    /// Returns `true` if the client accepts gzip.
    #[must_use]
    pub fn allows_gzip(self) -> bool {
        self.accepted.contains_gzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(ACCEPT_ENCODING, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn empty_header_allows_nothing() {
        let accept = AcceptEncoding::resolve(&HeaderMap::new());
        assert!(!accept.allows_brotli());
        assert!(!accept.allows_gzip());
    }

    #[test]
    fn wildcard_allows_everything() {
        let accept = AcceptEncoding::resolve(&headers(&["*"]));
        assert!(accept.allows_brotli());
        assert!(accept.allows_gzip());
    }

    #[test]
    fn single_tokens() {
        let accept = AcceptEncoding::resolve(&headers(&["br"]));
        assert!(accept.allows_brotli());
        assert!(!accept.allows_gzip());

        let accept = AcceptEncoding::resolve(&headers(&["gzip"]));
        assert!(!accept.allows_brotli());
        assert!(accept.allows_gzip());
    }

    #[test]
    fn combined_tokens_with_whitespace() {
        let accept = AcceptEncoding::resolve(&headers(&["gzip, br"]));
        assert!(accept.allows_brotli());
        assert!(accept.allows_gzip());
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let accept = AcceptEncoding::resolve(&headers(&["deflate, zstd"]));
        assert!(!accept.allows_brotli());
        assert!(!accept.allows_gzip());

        let accept = AcceptEncoding::resolve(&headers(&["deflate, gzip"]));
        assert!(accept.allows_gzip());
    }

    #[test]
    fn repeated_tokens_stay_enabled() {
        // Token scanning is idempotent: repeating a coding must not cancel it.
        let accept = AcceptEncoding::resolve(&headers(&["gzip, gzip"]));
        assert!(accept.allows_gzip());
    }

    #[test]
    fn multiple_header_values_accumulate() {
        let accept = AcceptEncoding::resolve(&headers(&["gzip", "br"]));
        assert!(accept.allows_brotli());
        assert!(accept.allows_gzip());
    }

    #[test]
    fn wildcard_anywhere_short_circuits() {
        let accept = AcceptEncoding::resolve(&headers(&["identity", "deflate, *"]));
        assert!(accept.allows_brotli());
        assert!(accept.allows_gzip());
    }

    #[test]
    fn encoding_set_operations() {
        let mut set = EncodingSet::NONE;
        assert!(set.is_none());
        set.insert(EncodingSet::BROTLI);
        assert!(set.contains_brotli());
        assert!(!set.contains_gzip());
        set.insert(EncodingSet::GZIP);
        assert_eq!(set, EncodingSet::ALL);
    }
}
