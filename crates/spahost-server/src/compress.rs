//! Brotli and gzip compression profiles.
//!
//! Two call sites, two quality profiles:
//!
//! - **best**: the offline profile used to produce `.br`/`.gz` sibling
//!   files once, ahead of serving. Ratio over speed.
//! - **fast**: the request-time profile used when no precompressed sibling
//!   exists but the client accepts an encoding. Latency over ratio.
//!
//! Content below [`COMPRESSION_THRESHOLD`] is never compressed; at that size
//! the coding overhead outweighs the savings.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Minimum content size in bytes for compression to apply.
pub const COMPRESSION_THRESHOLD: u64 = 1024;

/// Brotli quality for the offline best-effort profile.
const BROTLI_QUALITY_BEST: u32 = 11;
/// Brotli quality 4 keeps request-time latency in check while still beating
/// gzip ratios on typical SPA assets.
const BROTLI_QUALITY_FAST: u32 = 4;
/// Gzip level for the request-time profile.
const GZIP_LEVEL_FAST: u32 = 4;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_LGWIN: u32 = 22;

/// Compresses with the brotli best-effort profile.
pub fn brotli_best(content: &[u8]) -> std::io::Result<Vec<u8>> {
    brotli_with_quality(content, BROTLI_QUALITY_BEST)
}

/// Compresses with the brotli request-time profile.
pub fn brotli_fast(content: &[u8]) -> std::io::Result<Vec<u8>> {
    brotli_with_quality(content, BROTLI_QUALITY_FAST)
}

fn brotli_with_quality(content: &[u8], quality: u32) -> std::io::Result<Vec<u8>> {
    let mut writer =
        brotli::CompressorWriter::new(Vec::new(), BROTLI_BUFFER_SIZE, quality, BROTLI_LGWIN);
    writer.write_all(content)?;
    writer.flush()?;
    Ok(writer.into_inner())
}

/// Compresses with the gzip best-effort profile.
pub fn gzip_best(content: &[u8]) -> std::io::Result<Vec<u8>> {
    gzip_with_level(content, Compression::best())
}

/// Compresses with the gzip request-time profile.
pub fn gzip_fast(content: &[u8]) -> std::io::Result<Vec<u8>> {
    gzip_with_level(content, Compression::new(GZIP_LEVEL_FAST))
}

fn gzip_with_level(content: &[u8], level: Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), level);
    encoder.write_all(content)?;
    encoder.finish()
}
