//! Field resolution for sender configuration models.
//!
//! Sender specifications are deserialized structurally with serde, then
//! resolved in a second phase: path fields are anchored to the configpath and
//! password fields are run through the scheme resolver with host and username
//! values drawn from sibling fields. [`FieldSet`] is the record of
//! already-validated sibling values that second phase reads from.

use crate::error::{Error, InvalidConfigError, Result};
use crate::netrc::lookup_netrc;
use crate::passwords::{PasswordContext, resolve_password};
use crate::util::resolve_path;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Validated sibling values available while resolving one field.
///
/// The configpath is resolved to an absolute path at construction; every
/// path field is then anchored to it.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    configpath: Option<PathBuf>,
    values: serde_json::Map<String, Value>,
}

impl FieldSet {
    /// Creates a field set for a model read from `configpath`.
    #[must_use]
    pub fn new(configpath: Option<&Path>) -> Self {
        Self {
            configpath: configpath.map(|p| resolve_path(p, None)),
            values: serde_json::Map::new(),
        }
    }

    /// Returns the resolved configpath, if any.
    #[must_use]
    pub fn configpath(&self) -> Option<&Path> {
        self.configpath.as_deref()
    }

    /// Records a validated field value under `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.insert(name.into(), value);
    }

    /// Returns the recorded value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Resolves a path field against the configpath.
    #[must_use]
    pub fn path(&self, raw: impl AsRef<Path>) -> PathBuf {
        resolve_path(raw.as_ref(), self.configpath.as_deref())
    }

    /// Resolves a path field that must name an existing file.
    ///
    /// # Errors
    ///
    /// Fails when the resolved path is not a file.
    pub fn file_path(&self, raw: impl AsRef<Path>) -> Result<PathBuf, InvalidConfigError> {
        let path = self.path(raw);
        if path.is_file() {
            Ok(path)
        } else {
            Err(InvalidConfigError::new(format!(
                "path does not point to a file: {}",
                path.display()
            )))
        }
    }

    /// Resolves a path field that must name an existing directory.
    ///
    /// # Errors
    ///
    /// Fails when the resolved path is not a directory.
    pub fn dir_path(&self, raw: impl AsRef<Path>) -> Result<PathBuf, InvalidConfigError> {
        let path = self.path(raw);
        if path.is_dir() {
            Ok(path)
        } else {
            Err(InvalidConfigError::new(format!(
                "path does not point to a directory: {}",
                path.display()
            )))
        }
    }
}

/// Where a password field draws its host or username from.
#[derive(Debug, Clone, Copy)]
pub enum FieldSource {
    /// No value is supplied.
    None,
    /// A constant fixed when the field is declared.
    Fixed(&'static str),
    /// The named sibling field's validated value.
    Sibling(&'static str),
    /// A function over the validated sibling values.
    Computed(fn(&FieldSet) -> Result<Option<String>, InvalidConfigError>),
}

/// A password field declaration: how to obtain the host and username context
/// handed to the scheme resolver.
///
/// A fixed constant and a sibling-field name cannot be combined for the same
/// slot; each slot is exactly one [`FieldSource`].
#[derive(Debug, Clone, Copy)]
pub struct PasswordField {
    host: FieldSource,
    username: FieldSource,
}

impl PasswordField {
    /// Declares a password field with the given host and username sources.
    #[must_use]
    pub const fn new(host: FieldSource, username: FieldSource) -> Self {
        Self { host, username }
    }

    /// The convention used by credential sets: host from the sibling field
    /// `host`, username from the sibling field `username`.
    #[must_use]
    pub const fn standard() -> Self {
        Self::new(FieldSource::Sibling("host"), FieldSource::Sibling("username"))
    }

    /// Resolves a password specifier with context drawn from `fields`.
    ///
    /// # Errors
    ///
    /// A missing sibling or a failed computed source fails with
    /// "Insufficient data to determine password". Specifier resolution
    /// failures surface as [`InvalidConfigError`] carrying the resolver's
    /// message.
    pub fn resolve(self, specifier: &Value, fields: &FieldSet) -> Result<SecretString> {
        let host = source_value(self.host, fields)?;
        let username = source_value(self.username, fields)?;
        let context = PasswordContext {
            host: host.as_deref(),
            username: username.as_deref(),
            configpath: fields.configpath(),
        };
        match resolve_password(specifier, context) {
            Ok(password) => Ok(SecretString::new(password)),
            Err(Error::InvalidPassword(err)) => Err(InvalidConfigError::new(err.details).into()),
            Err(other) => Err(other),
        }
    }
}

fn source_value(
    source: FieldSource,
    fields: &FieldSet,
) -> Result<Option<String>, InvalidConfigError> {
    match source {
        FieldSource::None => Ok(None),
        FieldSource::Fixed(value) => Ok(Some(value.to_string())),
        FieldSource::Sibling(name) => match fields.get(name) {
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(Value::Null) => Ok(None),
            _ => Err(insufficient_data()),
        },
        FieldSource::Computed(compute) => compute(fields).map_err(|_| insufficient_data()),
    }
}

fn insufficient_data() -> InvalidConfigError {
    InvalidConfigError::new("Insufficient data to determine password")
}

/// The `netrc` field of a credential set: a switch or a netrc file path.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NetrcField {
    /// `true` to consult the default netrc file, `false` to skip netrc.
    Switch(bool),
    /// Consult the given netrc file.
    File(PathBuf),
}

impl Default for NetrcField {
    fn default() -> Self {
        Self::Switch(false)
    }
}

impl NetrcField {
    /// Returns true when netrc lookup is requested.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Switch(false))
    }
}

/// The netrc-or-explicit credential sub-model shared by host-authenticating
/// backends: an explicit password, a netrc lookup, or no credentials at all.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSpec {
    /// Host to authenticate against.
    pub host: String,
    /// Username, when given explicitly.
    #[serde(default)]
    pub username: Option<String>,
    /// Unresolved password specifier, when given.
    #[serde(default)]
    pub password: Option<Value>,
    /// Whether (or where) to consult a netrc file.
    #[serde(default)]
    pub netrc: NetrcField,
}

/// Fully resolved credentials for one host.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Host to authenticate against.
    pub host: String,
    /// Username, when credentials were resolved.
    pub username: Option<String>,
    /// Password, when credentials were resolved.
    pub password: Option<SecretString>,
}

impl CredentialSpec {
    /// Resolves the credential set, validating its whole-object rules.
    ///
    /// Yields either a concrete username/password pair or credential-free
    /// access, preferring an explicit password and falling back to netrc.
    ///
    /// # Errors
    ///
    /// Fails when a password is combined with netrc, a password lacks a
    /// username, a username lacks both netrc and password, the netrc path is
    /// not a file, or the netrc lookup fails.
    pub fn resolve(self, configpath: Option<&Path>) -> Result<Credentials> {
        let mut fields = FieldSet::new(configpath);
        let netrc_path = match &self.netrc {
            NetrcField::File(path) => Some(fields.file_path(path)?),
            NetrcField::Switch(_) => None,
        };
        fields.insert("host", &self.host);
        fields.insert("username", &self.username);
        let password = match &self.password {
            Some(specifier) => Some(PasswordField::standard().resolve(specifier, &fields)?),
            None => None,
        };
        if let Some(password) = password {
            if self.netrc.is_enabled() {
                return Err(InvalidConfigError::new(
                    "netrc cannot be set when a password is present",
                )
                .into());
            }
            let Some(username) = self.username else {
                return Err(
                    InvalidConfigError::new("Password cannot be given without username").into(),
                );
            };
            Ok(Credentials {
                host: self.host,
                username: Some(username),
                password: Some(password),
            })
        } else if self.netrc.is_enabled() {
            let (username, password) = lookup_netrc(
                &self.host,
                self.username.as_deref(),
                netrc_path.as_deref(),
            )
            .map_err(|err| {
                InvalidConfigError::new(format!(
                    "Error retrieving password from netrc file: {err}"
                ))
            })?;
            Ok(Credentials {
                host: self.host,
                username: Some(username),
                password: Some(SecretString::new(password)),
            })
        } else if self.username.is_some() {
            Err(InvalidConfigError::new("Username cannot be given without netrc or password").into())
        } else {
            Ok(Credentials {
                host: self.host,
                username: None,
                password: None,
            })
        }
    }
}
