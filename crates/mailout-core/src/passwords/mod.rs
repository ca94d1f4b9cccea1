//! Password specifier resolution through named schemes.
//!
//! A password in a sender specification is either a literal string or a
//! single-key object `{"<scheme>": <value>}` naming a resolution scheme. The
//! [`SchemeRegistry`] maps scheme names to handler functions; [`schemes`]
//! holds the built-in handlers.

pub mod schemes;

use crate::error::{Error, InvalidPasswordError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Context a scheme handler may draw on while resolving a specifier.
///
/// Callers fill in whatever they know; handlers read only the parts they
/// need and ignore the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordContext<'a> {
    /// Host the password belongs to, when known.
    pub host: Option<&'a str>,
    /// Username the password belongs to, when known.
    pub username: Option<&'a str>,
    /// Config file the specifier came from, for relative paths and error
    /// attribution.
    pub configpath: Option<&'a Path>,
}

/// Resolves one scheme's specifier value into a plaintext password.
pub type SchemeHandler = fn(&Value, PasswordContext<'_>) -> Result<String>;

const SPECIFIER_SHAPE: &str =
    "Password must be either a string or an object with exactly one field";

static BUILTIN: LazyLock<SchemeRegistry> = LazyLock::new(SchemeRegistry::with_builtins);

/// Registry mapping password scheme names to their handlers.
///
/// Lookups are read-only; custom schemes register before the registry is
/// put to use.
#[derive(Debug, Clone)]
pub struct SchemeRegistry {
    schemes: BTreeMap<String, SchemeHandler>,
}

impl SchemeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            schemes: BTreeMap::new(),
        }
    }

    /// Creates a registry holding the built-in schemes.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("env", schemes::env);
        registry.register("file", schemes::file);
        registry.register("base64", schemes::base64);
        registry.register("dotenv", schemes::dotenv);
        registry.register("netrc", schemes::netrc);
        registry.register("keyring", schemes::keyring);
        registry
    }

    /// Returns the shared registry of built-in schemes.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Registers a handler under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: SchemeHandler) {
        self.schemes.insert(name.into(), handler);
    }

    /// Looks up the handler for a scheme name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SchemeHandler> {
        self.schemes.get(name).copied()
    }

    /// Resolves a password specifier into plaintext.
    ///
    /// A string specifier resolves to itself. Any other specifier must be an
    /// object with exactly one field, whose key names a registered scheme and
    /// whose value is handed to that scheme's handler along with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPasswordError`] for a malformed specifier or an
    /// unknown scheme, and whatever the handler fails with otherwise. Handler
    /// errors gain `context.configpath` attribution when they carry none.
    pub fn resolve(&self, specifier: &Value, context: PasswordContext<'_>) -> Result<String> {
        if let Some(literal) = specifier.as_str() {
            return Ok(literal.to_string());
        }
        let Some(object) = specifier.as_object() else {
            return Err(shape_error(context));
        };
        let mut fields = object.iter();
        let (Some((scheme, scheme_spec)), None) = (fields.next(), fields.next()) else {
            return Err(shape_error(context));
        };
        let Some(handler) = self.get(scheme) else {
            let mut err =
                InvalidPasswordError::new(format!("Unsupported password scheme '{scheme}'"));
            err.attribute(context.configpath);
            return Err(err.into());
        };
        debug!("Resolving password via '{scheme}' scheme");
        handler(scheme_spec, context).map_err(|err| match err {
            Error::InvalidPassword(mut inner) => {
                inner.attribute(context.configpath);
                Error::InvalidPassword(inner)
            }
            other => other,
        })
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn shape_error(context: PasswordContext<'_>) -> Error {
    let mut err = InvalidPasswordError::new(SPECIFIER_SHAPE);
    err.attribute(context.configpath);
    err.into()
}

/// Resolves a password specifier against the built-in scheme registry.
///
/// # Errors
///
/// As [`SchemeRegistry::resolve`].
pub fn resolve_password(specifier: &Value, context: PasswordContext<'_>) -> Result<String> {
    SchemeRegistry::builtin().resolve(specifier, context)
}
