//! Sending-method dispatch and configuration loading.
//!
//! A [`SenderRegistry`] maps method names to factories. The crate-level
//! [`from_config_file`] and [`from_dict`] helpers consult the built-in
//! registry, which knows the five standard methods; library callers that
//! bring their own methods build a registry of their own before first use
//! and hand it around read-only afterwards.

use crate::error::{Error, InvalidConfigError, MissingConfigError, Result};
use crate::senders::{CommandSender, MaildirSender, MboxSender, NullSender, Sender, SmtpSender};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// The configuration table handed to sender factories.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Builds a sender from its configuration table and the file it came from.
pub type SenderFactory = fn(&ConfigMap, Option<&Path>) -> Result<Box<dyn Sender>>;

/// Section of the configuration file that holds the sending method.
pub const DEFAULT_CONFIG_SECTION: &str = "outgoing";

static BUILTIN: LazyLock<SenderRegistry> = LazyLock::new(SenderRegistry::with_builtins);

/// A read-only map from method names to sender factories.
///
/// Populate it up front with [`register`](Self::register); lookups never
/// mutate it, so a populated registry can be shared freely.
#[derive(Debug, Clone)]
pub struct SenderRegistry {
    methods: BTreeMap<String, SenderFactory>,
}

impl SenderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }

    /// Creates a registry with the five standard methods registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("null", |data, configpath| {
            Ok(Box::new(NullSender::from_spec(data, configpath)))
        });
        registry.register("command", |data, configpath| {
            Ok(Box::new(CommandSender::from_spec(data, configpath)?))
        });
        registry.register("mbox", |data, configpath| {
            Ok(Box::new(MboxSender::from_spec(data, configpath)?))
        });
        registry.register("maildir", |data, configpath| {
            Ok(Box::new(MaildirSender::from_spec(data, configpath)?))
        });
        registry.register("smtp", |data, configpath| {
            Ok(Box::new(SmtpSender::from_spec(data, configpath)?))
        });
        registry
    }

    /// The shared registry holding the standard methods.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Registers `factory` under `method`, replacing any previous entry.
    pub fn register(&mut self, method: impl Into<String>, factory: SenderFactory) {
        self.methods.insert(method.into(), factory);
    }

    /// Returns the factory registered under `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<SenderFactory> {
        self.methods.get(method).copied()
    }

    /// Builds a sender from an already-extracted configuration table.
    ///
    /// The `method` field selects the factory; a `configpath` entry in the
    /// table is discarded in favor of the `configpath` argument, which is
    /// also used to annotate configuration errors.
    ///
    /// # Errors
    ///
    /// Fails when the `method` field is missing or names no registered
    /// factory, or when the factory rejects the table.
    pub fn from_dict(
        &self,
        data: &ConfigMap,
        configpath: Option<&Path>,
    ) -> Result<Box<dyn Sender>> {
        let mut data = data.clone();
        data.remove("configpath");
        let method = match data.get("method") {
            Some(Value::String(method)) => method.clone(),
            Some(other) => {
                return Err(attributed(format!("Unsupported method '{other}'"), configpath));
            }
            None => {
                return Err(attributed(
                    "Required 'method' field not present".to_string(),
                    configpath,
                ));
            }
        };
        let Some(factory) = self.get(&method) else {
            return Err(attributed(
                format!("Unsupported method '{method}'"),
                configpath,
            ));
        };
        debug!(%method, "Constructing sender");
        factory(&data, configpath).map_err(|err| annotate(err, configpath))
    }

    /// Loads a sender from a configuration file.
    ///
    /// With `path` of `None` the default configuration file is read. With a
    /// `section`, the sender configuration is taken from that key of the
    /// document; without one, the whole document is the configuration. When
    /// the file or section is absent and `fallback` is set, the default
    /// configuration file is consulted under the default section, provided
    /// `path` does not already point at it.
    ///
    /// # Errors
    ///
    /// Fails when no configuration is found in any consulted file, when the
    /// file has an unsupported extension or malformed contents, or when the
    /// extracted configuration is rejected.
    pub fn from_config_file(
        &self,
        path: Option<&Path>,
        section: Option<&str>,
        fallback: bool,
    ) -> Result<Box<dyn Sender>> {
        let configpath = match path {
            Some(path) => path.to_path_buf(),
            None => get_default_configpath(),
        };
        debug!(configpath = %configpath.display(), "Reading configuration file");
        let document = read_document(&configpath)?;
        let data = match (document, section) {
            (Some(document), Some(section)) => {
                let Value::Object(mut toplevel) = document else {
                    return Err(attributed(
                        "Top-level structure must be a dict/object".to_string(),
                        Some(&configpath),
                    ));
                };
                toplevel.remove(section)
            }
            (document, _) => document,
        };
        match data {
            Some(Value::Object(fields)) => self.from_dict(&fields, Some(&configpath)),
            Some(_) => Err(attributed(
                "Section must be a dict/object".to_string(),
                Some(&configpath),
            )),
            None => {
                if fallback && configpath != get_default_configpath() {
                    debug!("Configuration not found; falling back to default file");
                    match self.from_config_file(None, Some(DEFAULT_CONFIG_SECTION), false) {
                        Err(Error::MissingConfig(mut err)) => {
                            err.configpaths.push(configpath);
                            Err(err.into())
                        }
                        outcome => outcome,
                    }
                } else {
                    Err(MissingConfigError {
                        configpaths: vec![configpath],
                    }
                    .into())
                }
            }
        }
    }
}

impl Default for SenderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Reads and parses a configuration file, keyed on its extension.
///
/// A missing file is not an error here; it reads as no document at all so
/// the caller can apply its fallback rule. An unsupported extension is
/// reported without touching the filesystem.
fn read_document(path: &Path) -> Result<Option<Value>> {
    enum Format {
        Toml,
        Json,
    }
    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Format::Toml,
        Some("json") => Format::Json,
        _ => {
            return Err(attributed(
                "Unsupported file extension".to_string(),
                Some(path),
            ));
        }
    };
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let document = match format {
        Format::Toml => toml::from_str(&text)?,
        Format::Json => serde_json::from_str(&text)?,
    };
    Ok(Some(document))
}

fn attributed(details: String, configpath: Option<&Path>) -> Error {
    let mut err = InvalidConfigError::new(details);
    err.attribute(configpath);
    err.into()
}

/// Adds the configpath to configuration errors that lack one.
fn annotate(mut err: Error, configpath: Option<&Path>) -> Error {
    match &mut err {
        Error::InvalidConfig(inner) => inner.attribute(configpath),
        Error::InvalidPassword(inner) => inner.attribute(configpath),
        _ => {}
    }
    err
}

/// Path of the default configuration file.
#[must_use]
pub fn get_default_configpath() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailout")
        .join("mailout.toml")
}

/// Builds a sender from a configuration table via the built-in registry.
///
/// # Errors
///
/// See [`SenderRegistry::from_dict`].
pub fn from_dict(data: &ConfigMap, configpath: Option<&Path>) -> Result<Box<dyn Sender>> {
    SenderRegistry::builtin().from_dict(data, configpath)
}

/// Loads a sender from a configuration file via the built-in registry.
///
/// # Errors
///
/// See [`SenderRegistry::from_config_file`].
pub fn from_config_file(
    path: Option<&Path>,
    section: Option<&str>,
    fallback: bool,
) -> Result<Box<dyn Sender>> {
    SenderRegistry::builtin().from_config_file(path, section, fallback)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn table(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_builds_the_named_method() {
        let sender = from_dict(&table(json!({"method": "null"})), None).unwrap();
        drop(sender);
    }

    #[test]
    fn test_boxed_senders_are_debuggable() {
        let sender = from_dict(&table(json!({"method": "null"})), None).unwrap();
        assert!(format!("{sender:?}").contains("NullSender"));
    }

    #[test]
    fn test_missing_method_is_reported() {
        let err = from_dict(&table(json!({})), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Required 'method' field not present"
        );
    }

    #[test]
    fn test_missing_method_is_attributed() {
        let err = from_dict(&table(json!({})), Some(Path::new("/etc/mailout.toml"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/etc/mailout.toml: Invalid configuration: Required 'method' field not present"
        );
    }

    #[test]
    fn test_unknown_method_is_reported() {
        let err = from_dict(&table(json!({"method": "unknown_xyz"})), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Unsupported method 'unknown_xyz'"
        );
    }

    #[test]
    fn test_factory_errors_gain_the_configpath() {
        let err = from_dict(
            &table(json!({"method": "command", "command": []})),
            Some(Path::new("/etc/mailout.toml")),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("/etc/mailout.toml: Invalid configuration: "), "{message}");
    }

    #[test]
    fn test_custom_registrations_dispatch() {
        let mut registry = SenderRegistry::new();
        registry.register("null", |data, configpath| {
            Ok(Box::new(NullSender::from_spec(data, configpath)))
        });
        assert!(registry.get("null").is_some());
        assert!(registry.get("command").is_none());
        let sender = registry
            .from_dict(&table(json!({"method": "null"})), None)
            .unwrap();
        drop(sender);
    }

    #[test]
    fn test_reads_the_named_section() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.toml", "[outgoing]\nmethod = \"null\"\n");
        let sender =
            from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false).unwrap();
        drop(sender);
    }

    #[test]
    fn test_reads_json_documents() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.json", "{\"outgoing\": {\"method\": \"null\"}}");
        let sender =
            from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false).unwrap();
        drop(sender);
    }

    #[test]
    fn test_no_section_takes_the_whole_document() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.toml", "method = \"null\"\n");
        let sender = from_config_file(Some(&path), None, false).unwrap();
        drop(sender);
    }

    #[test]
    fn test_missing_file_without_fallback_is_missing_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let err = from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "outgoing configuration not found in files: {}",
                path.display()
            )
        );
    }

    #[test]
    fn test_missing_section_without_fallback_is_missing_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.toml", "[unrelated]\nkey = 1\n");
        let err = from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false)
            .unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)), "{err}");
    }

    #[test]
    fn test_unsupported_extension_is_checked_before_reading() {
        let err = from_config_file(
            Some(Path::new("/nonexistent/cfg.yaml")),
            Some(DEFAULT_CONFIG_SECTION),
            false,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "/nonexistent/cfg.yaml: Invalid configuration: Unsupported file extension"
        );
    }

    #[test]
    fn test_extension_match_is_exact() {
        let err = from_config_file(
            Some(Path::new("/nonexistent/cfg.TOML")),
            Some(DEFAULT_CONFIG_SECTION),
            false,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("Unsupported file extension"),
            "{err}"
        );
    }

    #[test]
    fn test_non_object_toplevel_is_rejected_when_section_given() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.json", "[1, 2, 3]");
        let err = from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "{}: Invalid configuration: Top-level structure must be a dict/object",
                path.display()
            )
        );
    }

    #[test]
    fn test_non_object_document_is_rejected_without_section() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.json", "[1, 2, 3]");
        let err = from_config_file(Some(&path), None, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "{}: Invalid configuration: Section must be a dict/object",
                path.display()
            )
        );
    }

    #[test]
    fn test_non_object_section_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.toml", "outgoing = \"null\"\n");
        let err = from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "{}: Invalid configuration: Section must be a dict/object",
                path.display()
            )
        );
    }

    #[test]
    fn test_toml_parse_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.toml", "method = [not toml\n");
        let err = from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false)
            .unwrap_err();
        assert!(matches!(err, Error::Toml(_)), "{err}");
    }

    #[test]
    fn test_json_parse_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cfg.json", "{not json");
        let err = from_config_file(Some(&path), Some(DEFAULT_CONFIG_SECTION), false)
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)), "{err}");
    }

    #[test]
    fn test_errors_carry_the_path_as_given() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "cfg.toml", "[outgoing]\n");
        let err = from_config_file(
            Some(&dir.path().join("cfg.toml")),
            Some(DEFAULT_CONFIG_SECTION),
            false,
        )
        .unwrap_err();
        assert!(
            err.to_string()
                .starts_with(&format!("{}: ", dir.path().join("cfg.toml").display())),
            "{err}"
        );
    }

    #[test]
    fn test_default_configpath_is_under_the_config_dir() {
        let path = get_default_configpath();
        assert!(path.ends_with("mailout/mailout.toml"), "{}", path.display());
    }
}
