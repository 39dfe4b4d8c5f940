//! Resolved response entities with lazily materialized content.
//!
//! A [`ResponseEntity`] is the result of classifying a request path against
//! the filesystem. Its metadata (size, modification time, MIME type,
//! available precompressed siblings) is a snapshot taken at resolution time
//! and never re-validated. The raw, brotli and gzip byte buffers are
//! populated on first access and memoized per instance.
//!
//! Entities are handled by value: the cache stores owned records, and the
//! orchestrator pushes a freshly populated entity back into the cache so
//! that future hits skip the disk.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;

use crate::compress;
use crate::encoding::EncodingSet;

/// Classification of a resolved request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// No matching file and no resolvable `index.html`.
    NotFound,
    /// A regular file.
    File,
    /// A build output whose name embeds a content hash; safe to cache
    /// indefinitely.
    FingerprintedFile,
    /// An `index.html` served through the dynamic render path.
    Index,
}

/// A resolved request path with memoized content buffers.
#[derive(Debug, Clone)]
pub struct ResponseEntity {
    path: PathBuf,
    file_type: FileType,
    size: u64,
    mod_time: Option<SystemTime>,
    content_type: String,
    compressable: bool,
    available: EncodingSet,
    content: Option<Bytes>,
    content_brotli: Option<Bytes>,
    content_gzip: Option<Bytes>,
}

impl ResponseEntity {
    pub(crate) fn new(
        path: PathBuf,
        file_type: FileType,
        size: u64,
        mod_time: Option<SystemTime>,
        content_type: String,
        compressable: bool,
        available: EncodingSet,
    ) -> Self {
        Self {
            path,
            file_type,
            size,
            mod_time,
            content_type,
            compressable,
            available,
            content: None,
            content_brotli: None,
            content_gzip: None,
        }
    }

    pub(crate) fn not_found() -> Self {
        Self::new(
            PathBuf::new(),
            FileType::NotFound,
            0,
            None,
            String::new(),
            false,
            EncodingSet::NONE,
        )
    }

    /// Absolute filesystem path, empty for not-found entities.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size snapshot from resolution time.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Modification time snapshot from resolution time.
    #[must_use]
    pub fn mod_time(&self) -> Option<SystemTime> {
        self.mod_time
    }

    /// MIME type derived from the file extension, possibly empty.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Whether the entity is eligible for compressed serving.
    #[must_use]
    pub fn compressable(&self) -> bool {
        self.compressable
    }

    #[must_use]
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.file_type == FileType::NotFound
    }

    #[must_use]
    pub fn is_index(&self) -> bool {
        self.file_type == FileType::Index
    }

    #[must_use]
    pub fn is_fingerprinted(&self) -> bool {
        self.file_type == FileType::FingerprintedFile
    }

    /// Whether a precompressed `.br` sibling existed at resolution time.
    #[must_use]
    pub fn has_brotli(&self) -> bool {
        self.available.contains_brotli()
    }

    /// Whether a precompressed `.gz` sibling existed at resolution time.
    #[must_use]
    pub fn has_gzip(&self) -> bool {
        self.available.contains_gzip()
    }

    /// Returns the raw content, reading it from disk on first access.
    ///
    /// The boolean reports whether this call freshly touched the disk; the
    /// caller uses it to push the populated entity back into the cache.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors verbatim, including permission errors.
    pub fn content(&mut self) -> std::io::Result<(Bytes, bool)> {
        if let Some(content) = &self.content {
            return Ok((content.clone(), false));
        }

        let content = Bytes::from(std::fs::read(&self.path)?);
        self.content = Some(content.clone());
        Ok((content, true))
    }

    /// Returns the brotli content: the precompressed sibling if one exists,
    /// otherwise the raw content compressed with the fast profile.
    pub fn content_brotli(&mut self) -> std::io::Result<(Bytes, bool)> {
        if let Some(content) = &self.content_brotli {
            return Ok((content.clone(), false));
        }

        let content = if self.has_brotli() {
            Bytes::from(std::fs::read(sibling_path(&self.path, ".br"))?)
        } else {
            let (raw, _) = self.content()?;
            Bytes::from(compress::brotli_fast(&raw)?)
        };
        self.content_brotli = Some(content.clone());
        Ok((content, true))
    }

    /// Returns the gzip content: the precompressed sibling if one exists,
    /// otherwise the raw content compressed with the fast profile.
    pub fn content_gzip(&mut self) -> std::io::Result<(Bytes, bool)> {
        if let Some(content) = &self.content_gzip {
            return Ok((content.clone(), false));
        }

        let content = if self.has_gzip() {
            Bytes::from(std::fs::read(sibling_path(&self.path, ".gz"))?)
        } else {
            let (raw, _) = self.content()?;
            Bytes::from(compress::gzip_fast(&raw)?)
        };
        self.content_gzip = Some(content.clone());
        Ok((content, true))
    }
}

/// Appends a compression suffix to the full file name (`app.js` →
/// `app.js.br`).
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entity_for(path: PathBuf, available: EncodingSet) -> ResponseEntity {
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        ResponseEntity::new(
            path,
            FileType::File,
            size,
            None,
            "text/plain".to_string(),
            true,
            available,
        )
    }

    #[test]
    fn content_is_memoized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "hello").unwrap();

        let mut entity = entity_for(path, EncodingSet::NONE);
        let (first, fresh_first) = entity.content().unwrap();
        let (second, fresh_second) = entity.content().unwrap();

        assert_eq!(first, second);
        assert!(fresh_first);
        assert!(!fresh_second);
    }

    #[test]
    fn brotli_prefers_precompressed_sibling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "raw content").unwrap();
        fs::write(dir.path().join("file.txt.br"), b"sibling bytes").unwrap();

        let mut entity = entity_for(path, EncodingSet::BROTLI);
        let (content, fresh) = entity.content_brotli().unwrap();
        assert_eq!(content.as_ref(), b"sibling bytes");
        assert!(fresh);

        let (_, fresh) = entity.content_brotli().unwrap();
        assert!(!fresh);
    }

    #[test]
    fn gzip_prefers_precompressed_sibling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "raw content").unwrap();
        fs::write(dir.path().join("file.txt.gz"), b"gz sibling").unwrap();

        let mut entity = entity_for(path, EncodingSet::GZIP);
        let (content, _) = entity.content_gzip().unwrap();
        assert_eq!(content.as_ref(), b"gz sibling");
    }

    #[test]
    fn missing_sibling_compresses_on_the_fly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        let raw = "on the fly ".repeat(50);
        fs::write(&path, &raw).unwrap();

        let mut entity = entity_for(path, EncodingSet::NONE);
        let (brotli_content, _) = entity.content_brotli().unwrap();
        let (gzip_content, _) = entity.content_gzip().unwrap();

        use std::io::Read;
        let mut decompressed = Vec::new();
        brotli::Decompressor::new(brotli_content.as_ref(), 4096)
            .read_to_end(&mut decompressed)
            .unwrap();
        assert_eq!(decompressed, raw.as_bytes());

        decompressed.clear();
        flate2::read::GzDecoder::new(gzip_content.as_ref())
            .read_to_end(&mut decompressed)
            .unwrap();
        assert_eq!(decompressed, raw.as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn permission_errors_surface_from_all_accessors() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.txt");
        fs::write(&path, "secret").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        let mut entity = entity_for(path.clone(), EncodingSet::NONE);
        assert_eq!(
            entity.content().unwrap_err().kind(),
            std::io::ErrorKind::PermissionDenied
        );
        assert_eq!(
            entity.content_brotli().unwrap_err().kind(),
            std::io::ErrorKind::PermissionDenied
        );
        assert_eq!(
            entity.content_gzip().unwrap_err().kind(),
            std::io::ErrorKind::PermissionDenied
        );

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn missing_file_is_a_not_found_error() {
        let mut entity = entity_for(PathBuf::from("/does/not/exist.txt"), EncodingSet::NONE);
        assert_eq!(
            entity.content().unwrap_err().kind(),
            std::io::ErrorKind::NotFound
        );
    }
}
