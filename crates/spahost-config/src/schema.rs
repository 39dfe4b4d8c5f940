//! The `ngssc.json` deployment descriptor.
//!
//! An `ngssc.json` file describes which environment variables a single-page
//! application expects at runtime and in which shape they are exposed to the
//! browser. The server reads it once at startup; the variable values are
//! then kept live through the `.env` watcher.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::ConfigError;

/// The populated variable map injected into `index.html`.
///
/// `None` values render as `null` in the IIFE payload, marking variables
/// that are declared but not set in any source. A `BTreeMap` keeps the
/// serialized JSON deterministic, so the CSP hash of the injected script is
/// stable across renders of the same state.
pub type VariableMap = BTreeMap<String, Option<String>>;

/// The shape of the injected configuration object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// `self.process = {"env": {...}}`
    Process,
    /// `Object.assign(self, {...})`
    Global,
    /// `self.NG_ENV = {...}` (legacy)
    NgEnv,
}

impl Variant {
    fn from_str(value: &str) -> Option<Self> {
        match value {
            "process" => Some(Self::Process),
            "global" => Some(Self::Global),
            "NG_ENV" => Some(Self::NgEnv),
            _ => None,
        }
    }
}

/// Raw JSON shape of `ngssc.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NgsscJson {
    variant: Option<String>,
    environment_variables: Option<Vec<String>>,
    file_pattern: Option<String>,
}

/// Parsed and populated `ngssc.json` configuration.
#[derive(Debug, Clone)]
pub struct NgsscConfig {
    /// Path the configuration was read from (or the working directory for
    /// the fallback configuration).
    pub file_path: PathBuf,
    /// Shape of the injected configuration object.
    pub variant: Variant,
    /// Variable names declared in `ngssc.json`.
    pub environment_variables: Vec<String>,
    /// Current variable values, from the process environment overlaid with
    /// the `.env` file.
    pub variables: VariableMap,
    /// Glob pattern matching the files targeted by the offline insert tool.
    pub file_pattern: String,
}

const DEFAULT_FILE_PATTERN: &str = "**/index.html";

impl NgsscConfig {
    /// Reads and validates an `ngssc.json` file.
    ///
    /// `path` may point at the file itself or at a directory containing it.
    /// Declared variables are populated from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// violates the schema (`environmentVariables` missing, unknown
    /// `variant`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut path = path.as_ref().to_path_buf();
        if !path.ends_with("ngssc.json") {
            path = path.join("ngssc.json");
        }

        let data = std::fs::read(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let raw: NgsscJson =
            serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        let environment_variables =
            raw.environment_variables
                .ok_or_else(|| ConfigError::Invalid {
                    path: path.clone(),
                    message: "environmentVariables must be defined".to_string(),
                })?;
        let variant = raw
            .variant
            .as_deref()
            .and_then(Variant::from_str)
            .ok_or_else(|| ConfigError::Invalid {
                path: path.clone(),
                message: "variant must be process, global or NG_ENV".to_string(),
            })?;

        let variables = populate_from_env(&environment_variables);
        Ok(Self {
            file_path: path,
            variant,
            environment_variables,
            variables,
            file_pattern: raw
                .file_pattern
                .unwrap_or_else(|| DEFAULT_FILE_PATTERN.to_string()),
        })
    }

    /// Creates the fallback configuration used when no `ngssc.json` is
    /// present: `global` variant with no declared variables.
    #[must_use]
    pub fn fallback<P: AsRef<Path>>(working_directory: P) -> Self {
        Self {
            file_path: working_directory.as_ref().to_path_buf(),
            variant: Variant::Global,
            environment_variables: Vec::new(),
            variables: VariableMap::new(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }

    /// Applies a freshly parsed `.env` variable map.
    ///
    /// With declared variables, the map is overlaid key by key: a key absent
    /// from the `.env` map falls back to the process environment, then to
    /// unset. Without declared variables the map replaces the current
    /// variables outright.
    pub fn apply_dotenv(&mut self, variables: VariableMap) {
        if self.environment_variables.is_empty() {
            self.variables = variables;
            return;
        }

        for name in &self.environment_variables {
            let value = match variables.get(name) {
                Some(value) => value.clone(),
                None => std::env::var(name).ok(),
            };
            self.variables.insert(name.clone(), value);
        }
    }

    /// Builds the IIFE script content that exposes the current variables to
    /// the client application.
    #[must_use]
    pub fn build_iife_script(&self) -> String {
        // BTreeMap of Option<String> serializes without fallible cases.
        let env_json = serde_json::to_string(&self.variables).unwrap_or_else(|_| "{}".to_string());
        let payload = match self.variant {
            Variant::NgEnv => format!("self.NG_ENV={env_json}"),
            Variant::Global => format!("Object.assign(self,{env_json})"),
            Variant::Process => format!("self.process={{\"env\":{env_json}}}"),
        };

        format!("(function(self){{{payload};}})(window)")
    }
}

fn populate_from_env(names: &[String]) -> VariableMap {
    names
        .iter()
        .map(|name| (name.clone(), std::env::var(name).ok()))
        .collect()
}

/// Hashes an inline script for use in a `Content-Security-Policy` header.
///
/// Produces `'<algorithm>-<base64 digest>'`. Supported algorithms are
/// `sha512` (default), `sha384` and `sha256`; unknown names log a warning
/// and fall back to sha512.
#[must_use]
pub fn script_hash(script: &str, algorithm: &str) -> String {
    let (digest, name): (Vec<u8>, &str) = match algorithm.to_lowercase().as_str() {
        "" | "sha512" => (Sha512::digest(script).to_vec(), "sha512"),
        "sha384" => (Sha384::digest(script).to_vec(), "sha384"),
        "sha256" => (Sha256::digest(script).to_vec(), "sha256"),
        other => {
            tracing::warn!("Unknown hash algorithm {other}. Using sha512 instead.");
            (Sha512::digest(script).to_vec(), "sha512")
        }
    };

    format!("'{name}-{}'", BASE64.encode(digest))
}
