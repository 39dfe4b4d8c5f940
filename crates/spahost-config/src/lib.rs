//! Configuration sources for the spahost static server.
//!
//! This crate provides the two configuration collaborators of the request
//! pipeline:
//!
//! - [`NgsscConfig`]: the `ngssc.json` deployment descriptor, describing
//!   which environment variables are injected into `index.html` and in which
//!   shape (the *variant*).
//! - [`DotEnv`]: a `.env` file parser with a filesystem watch, feeding
//!   updated variable maps into the server without a restart.
//!
//! Both degrade gracefully: a missing or unparsable `ngssc.json` falls back
//! to a default configuration, and a missing `.env` file yields an empty
//! variable map.

mod dotenv;
mod error;
mod schema;

pub use dotenv::{parse_dotenv, DotEnv};
pub use error::ConfigError;
pub use schema::{script_hash, NgsscConfig, VariableMap, Variant};
