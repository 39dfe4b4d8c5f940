//! Dynamic index rendering: IIFE injection and CSP support.
//!
//! Index responses are never served from precompressed siblings. Each
//! render injects the configuration IIFE into the raw `index.html`,
//! generates a per-response CSP nonce, and builds the
//! `Content-Security-Policy` header from a template by substituting the
//! script hash and nonce placeholders.

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};
use regex::{NoExpand, Regex};

/// Placeholder substituted with `'nonce-<value>'` in the CSP template and
/// with the literal nonce in the rendered body.
pub const NONCE_PLACEHOLDER: &str = "${NGSSC_CSP_NONCE}";
/// Placeholder substituted with the hash of the injected IIFE script.
pub const HASH_PLACEHOLDER: &str = "${NGSSC_CSP_HASH}";
/// Variable name that, when declared, receives the generated nonce so it is
/// also injected into the IIFE payload.
pub const CSP_NONCE_VARIABLE: &str = "NGSSC_CSP_NONCE";

const NONCE_LENGTH: usize = 10;
const NONCE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Inserts the configuration IIFE into `index.html` content.
///
/// Insertion points, in order of precedence: an existing
/// `<!--ngssc-->…<!--/ngssc-->` marker, a `<!--CONFIG-->` marker, after the
/// first `</title>`, before `</head>`.
#[derive(Debug, Clone)]
pub struct IifeInserter {
    ngssc_marker: Regex,
    config_marker: Regex,
}

impl IifeInserter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ngssc_marker: Regex::new(r"<!--ngssc-->[\w\W]*<!--/ngssc-->")
                .expect("ngssc marker pattern is valid"),
            config_marker: Regex::new(r"<!--\s*CONFIG\s*-->")
                .expect("config marker pattern is valid"),
        }
    }

    /// Wraps `script` in a marked `<script>` tag and inserts it into `html`.
    #[must_use]
    pub fn apply(&self, html: &str, script: &str) -> String {
        let tag = format!("<!--ngssc--><script>{script}</script><!--/ngssc-->");
        if self.ngssc_marker.is_match(html) {
            self.ngssc_marker
                .replace_all(html, NoExpand(&tag))
                .into_owned()
        } else if self.config_marker.is_match(html) {
            self.config_marker
                .replace_all(html, NoExpand(&tag))
                .into_owned()
        } else if html.contains("</title>") {
            html.replacen("</title>", &format!("</title>{tag}"), 1)
        } else {
            html.replacen("</head>", &format!("{tag}</head>"), 1)
        }
    }
}

impl Default for IifeInserter {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a 10-character CSP nonce.
///
/// Sourced from the operating system's secure generator; if that fails the
/// nonce degrades to a time-seeded pseudo-random generator with a logged
/// warning.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LENGTH];
    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        tracing::warn!(
            "Failed to use secure random to generate CSP nonce. Falling back to insecure variant."
        );
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        let mut rng = StdRng::seed_from_u64(seed);
        return (0..NONCE_LENGTH)
            .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
            .collect();
    }

    bytes
        .iter()
        .map(|b| NONCE_ALPHABET[(*b as usize) % NONCE_ALPHABET.len()] as char)
        .collect()
}

/// Builds the `Content-Security-Policy` header value from a template.
#[must_use]
pub fn build_csp_header(template: &str, script_hash: &str, nonce: &str) -> String {
    template
        .replace(HASH_PLACEHOLDER, script_hash)
        .replace(NONCE_PLACEHOLDER, &format!("'nonce-{nonce}'"))
}
