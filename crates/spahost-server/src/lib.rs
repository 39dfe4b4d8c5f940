//! Request-serving pipeline for the spahost static server.
//!
//! spahost serves a built single-page application from a directory while
//! injecting runtime configuration into `index.html` at request time. The
//! pipeline is:
//!
//! 1. [`EntityResolver`] classifies the request path against the
//!    filesystem, including nested-locale `index.html` lookup and
//!    fingerprint detection.
//! 2. [`EntityCache`] keeps resolved [`ResponseEntity`] values behind a
//!    bounded LRU.
//! 3. [`AcceptEncoding`] negotiates brotli/gzip per request; the
//!    [`compress`] module provides the request-time fast profile and the
//!    offline best-effort profile.
//! 4. [`App`] orchestrates the per-request state machine, including the
//!    dynamic index render with IIFE injection and CSP nonce/hash.
//! 5. [`Server`] runs the hyper accept loop with graceful shutdown.

pub mod app;
pub mod cache;
pub mod compress;
pub mod encoding;
pub mod entity;
pub mod error;
pub mod params;
pub mod render;
pub mod resolver;
pub mod server;
pub mod shutdown;

pub use app::App;
pub use cache::EntityCache;
pub use encoding::{AcceptEncoding, EncodingSet};
pub use entity::{FileType, ResponseEntity};
pub use error::ServeError;
pub use params::ServerParams;
pub use resolver::EntityResolver;
pub use server::Server;
pub use shutdown::{ConnectionTracker, ShutdownSignal};
