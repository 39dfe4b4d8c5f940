//! Per-request orchestration.
//!
//! [`App`] owns the entity cache, the shared runtime configuration and the
//! `.env` watcher. Each request flows through method filtering, entity
//! lookup, header policy, encoding negotiation and content selection;
//! `index.html` responses additionally pass through the dynamic render
//! path that injects the configuration IIFE and the CSP header.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use parking_lot::RwLock;
use spahost_config::{script_hash, ConfigError, DotEnv, NgsscConfig};

use crate::cache::EntityCache;
use crate::compress;
use crate::encoding::{AcceptEncoding, EncodingSet};
use crate::entity::ResponseEntity;
use crate::error::{error_body, ServeError};
use crate::params::ServerParams;
use crate::render::{generate_nonce, build_csp_header, IifeInserter, CSP_NONCE_VARIABLE, NONCE_PLACEHOLDER};
use crate::resolver::EntityResolver;

/// Response body type served by the application.
pub type ResponseBody = Full<Bytes>;

/// The request handling core of the server.
pub struct App {
    params: ServerParams,
    cache: EntityCache,
    config: Arc<RwLock<NgsscConfig>>,
    inserter: IifeInserter,
    // Held for its watcher; dropping it stops `.env` reloads.
    _dotenv: DotEnv,
}

impl App {
    /// Builds the application: loads `ngssc.json` (or the fallback
    /// configuration), starts the `.env` watcher and indexes the working
    /// directory.
    ///
    /// Must be called within a Tokio runtime; the watcher spawns a task.
    #[must_use]
    pub fn create(params: ServerParams) -> Self {
        let config = Arc::new(RwLock::new(load_ngssc_config(&params.working_directory)));

        let watched = Arc::clone(&config);
        let dotenv = DotEnv::create(params.dotenv_path.clone(), move |variables| {
            watched.write().apply_dotenv(variables);
        });

        let resolver = EntityResolver::new(&params.working_directory);
        let cache = EntityCache::new(resolver, params.cache_enabled, params.cache_buffer);

        Self {
            params,
            cache,
            config,
            inserter: IifeInserter::new(),
            _dotenv: dotenv,
        }
    }

    /// Handles a single request, mapping pipeline errors to JSON error
    /// responses.
    pub fn handle<B>(&self, req: &Request<B>) -> Response<ResponseBody> {
        let method = req.method();
        let path = req.uri().path();
        tracing::debug!(%method, path, "Handling request");

        match self.respond(req) {
            Ok(response) => {
                tracing::debug!(%method, path, status = response.status().as_u16(), "Request served");
                response
            }
            Err(err) => {
                let status = err.status_code();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(%method, path, error = %err, "Request failed");
                } else {
                    tracing::info!(%method, path, status = status.as_u16(), "Request rejected");
                }
                error_response(status)
            }
        }
    }

    fn respond<B>(&self, req: &Request<B>) -> Result<Response<ResponseBody>, ServeError> {
        let method = req.method();
        let path = req.uri().path();

        if method != Method::GET && method != Method::HEAD {
            return Err(ServeError::MethodNotAllowed);
        }

        let mut entity = self.cache.get(path);
        if entity.is_not_found() {
            return Err(ServeError::NotFound(path.to_string()));
        }

        let mut headers = HeaderMap::new();
        let cache_control = if entity.is_fingerprinted() {
            format!("max-age={}", self.params.cache_control_max_age)
        } else {
            "no-store".to_string()
        };
        if let Ok(value) = HeaderValue::from_str(&cache_control) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if !entity.content_type().is_empty() {
            if let Ok(value) = HeaderValue::from_str(entity.content_type()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
        }

        let mut encoding = EncodingSet::NONE;
        if self.params.compression_threshold <= entity.size() && entity.compressable() {
            let accepted = AcceptEncoding::resolve(req.headers());
            tracing::debug!(
                path,
                size = entity.size(),
                brotli = accepted.allows_brotli(),
                gzip = accepted.allows_gzip(),
                "Compression eligible"
            );
            if accepted.allows_brotli() {
                encoding.insert(EncodingSet::BROTLI);
                headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("br"));
            } else if accepted.allows_gzip() {
                encoding.insert(EncodingSet::GZIP);
                headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            }
        }

        let (content, fresh) = if entity.is_index() {
            self.render_index(&mut entity, encoding, &mut headers)?
        } else if encoding.contains_brotli() {
            entity.content_brotli()?
        } else if encoding.contains_gzip() {
            entity.content_gzip()?
        } else {
            entity.content()?
        };
        if fresh {
            self.cache.put(path, entity.clone());
        }

        // Rendered index content tracks the live configuration, not the file
        // on disk, so time-based revalidation is disabled for it.
        let mod_time = if entity.is_index() {
            None
        } else {
            entity.mod_time()
        };
        serve_content(method, req.headers(), headers, mod_time, content)
    }

    /// Renders `index.html`: injects the configuration IIFE, substitutes
    /// nonce placeholders and builds the CSP header.
    ///
    /// The configuration is cloned under a short read lock so a concurrent
    /// `.env` reload never observes a half-rendered response.
    fn render_index(
        &self,
        entity: &mut ResponseEntity,
        encoding: EncodingSet,
        headers: &mut HeaderMap,
    ) -> Result<(Bytes, bool), ServeError> {
        let mut snapshot = self.config.read().clone();

        let mut nonce = String::new();
        if !self.params.csp_template.is_empty() {
            nonce = generate_nonce();
            if snapshot.variables.contains_key(CSP_NONCE_VARIABLE) {
                snapshot
                    .variables
                    .insert(CSP_NONCE_VARIABLE.to_string(), Some(nonce.clone()));
            }
        }

        let script = snapshot.build_iife_script();
        if !self.params.csp_template.is_empty() {
            let csp = build_csp_header(&self.params.csp_template, &script_hash(&script, ""), &nonce);
            match HeaderValue::from_str(&csp) {
                Ok(value) => {
                    headers.insert(header::CONTENT_SECURITY_POLICY, value);
                }
                Err(_) => tracing::warn!("CSP template produced an invalid header value"),
            }
        }

        let (raw, fresh) = entity.content()?;
        let html = String::from_utf8_lossy(&raw);
        let mut rendered = self.inserter.apply(&html, &script);
        if !nonce.is_empty() {
            rendered = rendered.replace(NONCE_PLACEHOLDER, &nonce);
        }
        let rendered = Bytes::from(rendered);

        // The eligibility check upstream used the on-disk size; the rendered
        // body can fall below the threshold, in which case the negotiated
        // encoding is dropped again.
        if (rendered.len() as u64) < self.params.compression_threshold {
            headers.remove(header::CONTENT_ENCODING);
            return Ok((rendered, fresh));
        }

        if encoding.contains_brotli() {
            Ok((Bytes::from(compress::brotli_fast(&rendered)?), fresh))
        } else if encoding.contains_gzip() {
            Ok((Bytes::from(compress::gzip_fast(&rendered)?), fresh))
        } else {
            Ok((rendered, fresh))
        }
    }
}

fn load_ngssc_config(working_directory: &Path) -> NgsscConfig {
    match NgsscConfig::from_path(working_directory) {
        Ok(config) => {
            tracing::info!(path = %config.file_path.display(), "Loaded ngssc.json");
            config
        }
        Err(ConfigError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            tracing::info!("No ngssc.json found. Serving without variable insertion.");
            NgsscConfig::fallback(working_directory)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read ngssc.json. Serving without variable insertion.");
            NgsscConfig::fallback(working_directory)
        }
    }
}

/// Writes `content` honoring conditional and range semantics:
/// `If-Modified-Since` yields 304, `Range` yields 206 or a 416 error, HEAD
/// responses carry headers only.
fn serve_content(
    method: &Method,
    request_headers: &HeaderMap,
    mut headers: HeaderMap,
    mod_time: Option<SystemTime>,
    content: Bytes,
) -> Result<Response<ResponseBody>, ServeError> {
    if let Some(mod_time) = mod_time {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(mod_time)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
        if not_modified(request_headers, mod_time) {
            headers.remove(header::CONTENT_TYPE);
            headers.remove(header::CONTENT_ENCODING);
            return Ok(build_response(headers, StatusCode::NOT_MODIFIED, Bytes::new()));
        }
    }

    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let total = content.len() as u64;
    let (status, body) = match parse_range_header(request_headers, total)? {
        Some((start, end)) => {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{total}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            let body = content.slice(start as usize..=end as usize);
            (StatusCode::PARTIAL_CONTENT, body)
        }
        None => (StatusCode::OK, content),
    };

    if let Ok(value) = HeaderValue::from_str(&body.len().to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }

    let body = if method == Method::HEAD { Bytes::new() } else { body };
    Ok(build_response(headers, status, body))
}

fn not_modified(request_headers: &HeaderMap, mod_time: SystemTime) -> bool {
    let Some(since) = request_headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| httpdate::parse_http_date(value).ok())
    else {
        return false;
    };

    // HTTP dates have second precision; truncate before comparing.
    match (
        mod_time.duration_since(SystemTime::UNIX_EPOCH),
        since.duration_since(SystemTime::UNIX_EPOCH),
    ) {
        (Ok(modified), Ok(since)) => modified.as_secs() <= since.as_secs(),
        _ => false,
    }
}

/// Parses a single `bytes=start-end` range, including suffix (`-500`) and
/// open-ended (`500-`) forms.
fn parse_range_header(
    request_headers: &HeaderMap,
    total: u64,
) -> Result<Option<(u64, u64)>, ServeError> {
    let Some(range) = request_headers.get(header::RANGE) else {
        return Ok(None);
    };

    let range = range
        .to_str()
        .map_err(|_| ServeError::InvalidRange("invalid header encoding".to_string()))?;
    let Some(spec) = range.strip_prefix("bytes=") else {
        return Err(ServeError::InvalidRange(
            "only byte ranges are supported".to_string(),
        ));
    };

    let parts: Vec<&str> = spec.split('-').collect();
    if parts.len() != 2 {
        return Err(ServeError::InvalidRange("invalid range format".to_string()));
    }

    let (start, end) = if parts[0].is_empty() {
        let suffix: u64 = parts[1]
            .parse()
            .map_err(|_| ServeError::InvalidRange("invalid suffix length".to_string()))?;
        (total.saturating_sub(suffix), total.saturating_sub(1))
    } else {
        let start: u64 = parts[0]
            .parse()
            .map_err(|_| ServeError::InvalidRange("invalid range start".to_string()))?;
        let end = if parts[1].is_empty() {
            total.saturating_sub(1)
        } else {
            parts[1]
                .parse()
                .map_err(|_| ServeError::InvalidRange("invalid range end".to_string()))?
        };
        (start, end)
    };

    if start > end || start >= total {
        return Err(ServeError::InvalidRange(format!(
            "range {start}-{end} not satisfiable for length {total}"
        )));
    }

    Ok(Some((start, end.min(total - 1))))
}

fn error_response(status: StatusCode) -> Response<ResponseBody> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    build_response(headers, status, Bytes::from(error_body(status)))
}

fn build_response(headers: HeaderMap, status: StatusCode, body: Bytes) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
