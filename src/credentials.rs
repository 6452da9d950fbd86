//! API key resolution.
//!
//! A [`CredentialResolver`] walks an ordered list of [`CredentialSource`]s
//! and returns the first non-blank value. The standard order is:
//!
//! 1. an explicit key passed by the caller (`--api-key`),
//! 2. the `CODEALIVE_API_KEY` environment variable,
//! 3. the OS credential store for the current platform.
//!
//! Sources are never merged, and resolution performs no network calls.

use std::fmt;

use crate::error::{CodeAliveError, Result};
use crate::keychain::{self, CredentialStore};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "CODEALIVE_API_KEY";

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One place an API key may be found.
pub trait CredentialSource {
    /// Short name used in diagnostics (e.g. `"environment"`).
    fn name(&self) -> &str;

    /// Return the raw value if this source has one.
    fn try_read(&self) -> Option<String>;
}

/// A key handed over directly by the caller.
pub struct ExplicitSource(pub Option<String>);

impl CredentialSource for ExplicitSource {
    fn name(&self) -> &str {
        "explicit"
    }

    fn try_read(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A key read from an environment variable.
pub struct EnvSource {
    var: String,
}

impl EnvSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new(API_KEY_ENV)
    }
}

impl CredentialSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn try_read(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// A key held in an OS credential store.
pub struct StoreSource {
    store: Box<dyn CredentialStore>,
}

impl StoreSource {
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl CredentialSource for StoreSource {
    fn name(&self) -> &str {
        self.store.label()
    }

    fn try_read(&self) -> Option<String> {
        self.store.read()
    }
}

/// Where a resolved key came from.
#[derive(Debug, Clone)]
pub struct Located {
    pub source: String,
    pub credential: Credential,
}

/// Ordered credential lookup. First non-blank hit wins.
pub struct CredentialResolver {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialResolver {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Explicit key, then `CODEALIVE_API_KEY`, then (optionally) the
    /// platform credential store.
    pub fn standard(explicit: Option<String>, use_os_store: bool) -> Self {
        let mut sources: Vec<Box<dyn CredentialSource>> = vec![
            Box::new(ExplicitSource(explicit)),
            Box::new(EnvSource::default()),
        ];
        if use_os_store {
            if let Some(store) = keychain::platform_store() {
                sources.push(Box::new(StoreSource::new(store)));
            }
        }
        Self::new(sources)
    }

    /// Find a key and report which source supplied it.
    pub fn locate(&self) -> Option<Located> {
        self.sources.iter().find_map(|source| {
            let value = source.try_read()?;
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            tracing::debug!(source = source.name(), "credential resolved");
            Some(Located {
                source: source.name().to_string(),
                credential: Credential::new(value),
            })
        })
    }

    /// Resolve the key or fail with [`CodeAliveError::CredentialNotFound`].
    pub fn resolve(&self) -> Result<Credential> {
        self.locate()
            .map(|found| found.credential)
            .ok_or(CodeAliveError::CredentialNotFound)
    }
}
