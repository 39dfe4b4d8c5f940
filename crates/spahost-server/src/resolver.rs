//! Entity resolution: classifying request paths against the filesystem.
//!
//! The resolver walks the root tree once at creation to discover
//! `index.html` files. A single index means a single-locale deployment: any
//! unresolved path serves that index. Multiple indexes mean per-locale
//! sub-applications (`/de/…`, `/en/…`): unresolved paths search upward from
//! the requested directory for the nearest ancestor index. Files created
//! after startup are invisible to the index discovery; that is first-class
//! behavior, not a bug.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use walkdir::WalkDir;

use crate::encoding::EncodingSet;
use crate::entity::{FileType, ResponseEntity};

/// MIME types worth compressing, matching the offline compression pass.
const COMPRESSIBLE_MIME_TYPES: &[&str] = &[
    "application/javascript",
    "application/json",
    "application/rss+xml",
    "application/vnd.ms-fontobject",
    "application/x-font-opentype",
    "application/x-font-truetype",
    "application/x-font-ttf",
    "application/x-javascript",
    "application/xhtml+xml",
    "application/xml",
    "font/eot",
    "font/opentype",
    "font/otf",
    "font/truetype",
    "image/svg+xml",
    "image/vnd.microsoft.icon",
    "image/x-icon",
    "image/x-win-bitmap",
    "text/css",
    "text/css; charset=utf-8",
    "text/html",
    "text/html; charset=utf-8",
    "text/javascript",
    "text/javascript; charset=utf-8",
    "text/plain",
    "text/plain; charset=utf-8",
    "text/xml",
    "text/xml; charset=utf-8",
];

fn is_compressible_mime(mime_type: &str) -> bool {
    COMPRESSIBLE_MIME_TYPES.contains(&mime_type)
}

/// How unresolved paths map to an `index.html`, fixed at startup.
#[derive(Debug, Clone)]
enum IndexLookup {
    /// No index anywhere: unresolved paths are not found.
    None,
    /// Exactly one index in the tree: always serve it.
    Single(PathBuf),
    /// Multiple indexes: search upward from the requested directory.
    PerDirectory,
}

/// Classifies request paths into [`ResponseEntity`] values.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    root: PathBuf,
    index_lookup: IndexLookup,
    fingerprint: Regex,
}

impl EntityResolver {
    /// Creates a resolver for `root`, walking the tree once to discover
    /// `index.html` files.
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let index_files = find_index_html_files(&root);
        let index_lookup = match index_files.as_slice() {
            [] => IndexLookup::None,
            [single] => IndexLookup::Single(single.clone()),
            _ => IndexLookup::PerDirectory,
        };

        Self {
            root,
            index_lookup,
            fingerprint: Regex::new(r"\.[a-zA-Z0-9]{16,}\.(js|mjs|css)$")
                .expect("fingerprint pattern is valid"),
        }
    }

    /// Resolves a request path to an entity.
    ///
    /// Existing regular files are classified as plain or fingerprinted and
    /// scanned for `.br`/`.gz` siblings. Anything else falls back to the
    /// index lookup.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> ResponseEntity {
        let relative = sanitize(request_path);
        let resolved = self.root.join(&relative);
        if is_file(&resolved) {
            return self.resolve_file(request_path, resolved);
        }

        let index_path = match &self.index_lookup {
            IndexLookup::None => None,
            IndexLookup::Single(path) => Some(path.clone()),
            IndexLookup::PerDirectory => find_file_upwards(&self.root, &relative, "index.html"),
        };

        match index_path {
            Some(path) => {
                let (size, mod_time) = file_meta(&path);
                let content_type = detect_mime_type(&path);
                ResponseEntity::new(
                    path,
                    FileType::Index,
                    size,
                    mod_time,
                    content_type,
                    true,
                    EncodingSet::NONE,
                )
            }
            None => ResponseEntity::not_found(),
        }
    }

    fn resolve_file(&self, request_path: &str, resolved: PathBuf) -> ResponseEntity {
        let file_type = if self.fingerprint.is_match(request_path) {
            FileType::FingerprintedFile
        } else {
            FileType::File
        };

        let mut available = EncodingSet::NONE;
        if is_file(&with_suffix(&resolved, ".br")) {
            available.insert(EncodingSet::BROTLI);
        }
        if is_file(&with_suffix(&resolved, ".gz")) {
            available.insert(EncodingSet::GZIP);
        }

        let (size, mod_time) = file_meta(&resolved);
        let content_type = detect_mime_type(&resolved);
        let compressable = !available.is_none() || is_compressible_mime(&content_type);
        ResponseEntity::new(
            resolved,
            file_type,
            size,
            mod_time,
            content_type,
            compressable,
            available,
        )
    }
}

/// Strips the leading slash and drops non-normal components, so `..`
/// segments can never escape the root.
fn sanitize(request_path: &str) -> PathBuf {
    Path::new(request_path.trim_start_matches('/'))
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect()
}

fn find_index_html_files(root: &Path) -> Vec<PathBuf> {
    let mut index_files = Vec::new();
    for entry in WalkDir::new(root) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && entry.file_name() == "index.html" {
                    index_files.push(entry.into_path());
                }
            }
            Err(err) => {
                tracing::error!(
                    "Failed to look up index.html files in {}: {err}",
                    root.display()
                );
            }
        }
    }

    index_files
}

/// Searches for `file_name` from `root/relative` upward to `root`.
fn find_file_upwards(root: &Path, relative: &Path, file_name: &str) -> Option<PathBuf> {
    let mut directory = root.join(relative);
    loop {
        let candidate = directory.join(file_name);
        if is_file(&candidate) {
            return Some(candidate);
        }
        if directory == *root {
            return None;
        }
        directory = directory.parent()?.to_path_buf();
    }
}

fn is_file(path: &Path) -> bool {
    path.is_file()
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn file_meta(path: &Path) -> (u64, Option<SystemTime>) {
    match std::fs::metadata(path) {
        Ok(metadata) => (metadata.len(), metadata.modified().ok()),
        Err(_) => (0, None),
    }
}

/// Detects the MIME type from the file extension.
///
/// Returns an empty string for unknown extensions; the orchestrator skips
/// the `Content-Type` header in that case.
fn detect_mime_type(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" | "webmanifest" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/truetype",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "",
    }
    .to_string()
}
