//! Netrc file parsing and credential lookup.

use crate::error::{Error, NetrcLookupError, NetrcParseError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parsed contents of a netrc file.
#[derive(Debug, Clone, Default)]
struct NetrcFile {
    machines: BTreeMap<String, Entry>,
    default: Option<Entry>,
}

/// Credentials recorded for one machine.
#[derive(Debug, Clone, Default)]
struct Entry {
    login: Option<String>,
    password: Option<String>,
}

/// Which keyword is waiting for its value token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Machine,
    Login,
    Password,
    Account,
    MacroName,
}

impl Pending {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Machine => "machine",
            Self::Login => "login",
            Self::Password => "password",
            Self::Account => "account",
            Self::MacroName => "macdef",
        }
    }
}

impl NetrcFile {
    /// Parses netrc syntax: `machine`/`default` entries with `login`,
    /// `password`, and `account` followers, `macdef` blocks skipped up to
    /// their terminating blank line, and `#` comments running to end of line.
    /// A value token may be wrapped in double quotes; `password ""` records
    /// an explicitly empty password.
    fn parse(content: &str, path: &Path) -> std::result::Result<Self, NetrcParseError> {
        let mut netrc = Self::default();
        // None while outside any entry; Some(None) is the default entry.
        let mut current: Option<(Option<String>, Entry)> = None;
        let mut pending: Option<Pending> = None;
        let mut in_macro = false;
        let mut lineno = 0;

        for line in content.lines() {
            lineno += 1;
            if in_macro {
                if line.trim().is_empty() {
                    in_macro = false;
                }
                continue;
            }
            for word in line.split_whitespace() {
                if word.starts_with('#') {
                    break;
                }
                match pending.take() {
                    Some(Pending::Machine) => {
                        netrc.flush(current.take());
                        current = Some((Some(unquote(word).to_string()), Entry::default()));
                    }
                    Some(Pending::MacroName) => {
                        in_macro = true;
                    }
                    Some(field @ (Pending::Login | Pending::Password | Pending::Account)) => {
                        let Some((_, entry)) = current.as_mut() else {
                            return Err(parse_error(
                                format!("'{}' outside machine entry", field.keyword()),
                                lineno,
                                path,
                            ));
                        };
                        match field {
                            Pending::Login => entry.login = Some(unquote(word).to_string()),
                            Pending::Password => {
                                entry.password = Some(unquote(word).to_string());
                            }
                            _ => {}
                        }
                    }
                    None => match word {
                        "machine" => pending = Some(Pending::Machine),
                        "default" => {
                            netrc.flush(current.take());
                            current = Some((None, Entry::default()));
                        }
                        "login" => pending = Some(Pending::Login),
                        "password" => pending = Some(Pending::Password),
                        "account" => pending = Some(Pending::Account),
                        "macdef" => pending = Some(Pending::MacroName),
                        other => {
                            return Err(parse_error(
                                format!("bad toplevel token '{other}'"),
                                lineno,
                                path,
                            ));
                        }
                    },
                }
                if in_macro {
                    // Remainder of the macdef line belongs to the macro.
                    break;
                }
            }
        }
        if let Some(unfinished) = pending {
            return Err(parse_error(
                format!("missing value for '{}'", unfinished.keyword()),
                lineno,
                path,
            ));
        }
        netrc.flush(current);
        Ok(netrc)
    }

    fn flush(&mut self, finished: Option<(Option<String>, Entry)>) {
        match finished {
            Some((Some(machine), entry)) => {
                self.machines.insert(machine, entry);
            }
            Some((None, entry)) => self.default = Some(entry),
            None => {}
        }
    }

    fn entry_for(&self, host: &str) -> Option<&Entry> {
        self.machines.get(host).or_else(|| self.default.as_ref())
    }
}

/// Strips one pair of surrounding double quotes, if present.
fn unquote(word: &str) -> &str {
    word.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(word)
}

fn parse_error(message: String, line: usize, path: &Path) -> NetrcParseError {
    NetrcParseError {
        message,
        line,
        path: path.to_path_buf(),
    }
}

/// Looks up credentials for `host` in a netrc file.
///
/// `path` defaults to `.netrc` in the home directory. A non-empty `username`
/// constrains the lookup: a netrc entry naming a different login is an error
/// rather than a silent substitution. An empty `username` is no constraint.
///
/// # Errors
///
/// Returns [`NetrcLookupError`] when no matching or default entry exists, the
/// entry has no password, or the entry's login differs from `username`.
/// Returns [`NetrcParseError`] for malformed files, and an I/O error when the
/// file cannot be read.
pub fn lookup_netrc(
    host: &str,
    username: Option<&str>,
    path: Option<&Path>,
) -> Result<(String, String)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => dirs::home_dir().unwrap_or_default().join(".netrc"),
    };
    debug!("Looking up {host} in netrc file {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    let netrc = NetrcFile::parse(&content, &path)?;
    let Some(entry) = netrc.entry_for(host) else {
        return Err(NetrcLookupError::new(format!(
            "No entry for '{host}' or default found in netrc file"
        ))
        .into());
    };
    let login = entry.login.clone().unwrap_or_default();
    if let Some(expected) = username {
        if !expected.is_empty() && expected != login {
            return Err(NetrcLookupError::new(format!(
                "Username mismatch in netrc: expected '{expected}', but netrc says '{login}'"
            ))
            .into());
        }
    }
    // An explicitly empty password ("") is still a password; the error is
    // for entries whose password token is missing altogether.
    match entry.password.as_deref() {
        Some(password) => Ok((login, password.to_string())),
        None => Err(NetrcLookupError::new("No password given in netrc entry").into()),
    }
}
