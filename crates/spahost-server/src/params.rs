//! Server parameters with environment overrides.
//!
//! Every parameter can be overridden through an environment variable,
//! matching the container-first deployment model: `_PORT`, `_CACHE`,
//! `_CACHE_CONTROL_MAX_AGE`, `_CACHE_BUFFER`, `_COMPRESSION_THRESHOLD`,
//! `_LOG_LEVEL`, `_LOG_FORMAT`, `_DOTENV_PATH` and `_CSP_TEMPLATE`.

use std::path::PathBuf;

use crate::compress::COMPRESSION_THRESHOLD;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default `Cache-Control` max-age for fingerprinted assets: one year.
pub const DEFAULT_CACHE_CONTROL_MAX_AGE: u64 = 60 * 60 * 24 * 365;

/// Default entity cache capacity.
pub const DEFAULT_CACHE_BUFFER: usize = 50 * 1024;

/// Default `.env` location for containerized deployments.
pub const DEFAULT_DOTENV_PATH: &str = "/config/.env";

/// Default CSP template applied to index responses.
pub const DEFAULT_CSP_TEMPLATE: &str = "default-src 'self'; style-src 'self' ${NGSSC_CSP_NONCE}; script-src 'self' ${NGSSC_CSP_HASH} ${NGSSC_CSP_NONCE};";

/// Runtime parameters of the server.
#[derive(Debug, Clone)]
pub struct ServerParams {
    /// Directory served as the application root.
    pub working_directory: PathBuf,
    /// TCP port to bind.
    pub port: u16,
    /// Watched `.env` file path.
    pub dotenv_path: PathBuf,
    /// `Cache-Control` max-age in seconds for fingerprinted assets.
    pub cache_control_max_age: u64,
    /// Whether the entity cache is enabled.
    pub cache_enabled: bool,
    /// Entity cache capacity in entries.
    pub cache_buffer: usize,
    /// Minimum content size in bytes for compressed serving.
    pub compression_threshold: u64,
    /// Log level name (`ERROR`..`TRACE`).
    pub log_level: String,
    /// Log output format: `text` or `json`.
    pub log_format: String,
    /// CSP template with `${NGSSC_CSP_HASH}`/`${NGSSC_CSP_NONCE}`
    /// placeholders; empty disables the CSP header.
    pub csp_template: String,
}

impl ServerParams {
    /// Creates the default parameters rooted at `working_directory`.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(working_directory: P) -> Self {
        Self {
            working_directory: working_directory.into(),
            port: DEFAULT_PORT,
            dotenv_path: PathBuf::from(DEFAULT_DOTENV_PATH),
            cache_control_max_age: DEFAULT_CACHE_CONTROL_MAX_AGE,
            cache_enabled: true,
            cache_buffer: DEFAULT_CACHE_BUFFER,
            compression_threshold: COMPRESSION_THRESHOLD,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            csp_template: DEFAULT_CSP_TEMPLATE.to_string(),
        }
    }

    /// Applies environment variable overrides on top of the current values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }

        if let Ok(max_age) = std::env::var("_CACHE_CONTROL_MAX_AGE") {
            if let Ok(max_age) = max_age.parse() {
                self.cache_control_max_age = max_age;
            }
        }

        if let Ok(enabled) = std::env::var("_CACHE") {
            if let Ok(enabled) = enabled.parse() {
                self.cache_enabled = enabled;
            }
        }

        if let Ok(buffer) = std::env::var("_CACHE_BUFFER") {
            if let Ok(buffer) = buffer.parse() {
                self.cache_buffer = buffer;
            }
        }

        if let Ok(threshold) = std::env::var("_COMPRESSION_THRESHOLD") {
            if let Ok(threshold) = threshold.parse() {
                self.compression_threshold = threshold;
            }
        }

        if let Ok(level) = std::env::var("_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Ok(format) = std::env::var("_LOG_FORMAT") {
            self.log_format = format;
        }

        if let Ok(path) = std::env::var("_DOTENV_PATH") {
            self.dotenv_path = PathBuf::from(path);
        }

        if let Ok(template) = std::env::var("_CSP_TEMPLATE") {
            self.csp_template = template;
        }

        self
    }
}
