//! Path resolution and scoped-resource helpers shared by the senders.

use std::path::{Component, Path, PathBuf};

/// Resolves a path from a config file against the file's location.
///
/// A leading `~` expands to the user's home directory first, so tilde paths
/// ignore `reference` entirely. Relative paths are anchored to the directory
/// containing `reference` (or the current directory when there is none), and
/// the result is normalized lexically, without consulting the filesystem.
#[must_use]
pub fn resolve_path(raw: &Path, reference: Option<&Path>) -> PathBuf {
    let expanded = expand_tilde(raw);
    let anchored = match reference {
        Some(refpath) => refpath.parent().unwrap_or(Path::new("")).join(&expanded),
        None => expanded,
    };
    let absolute = if anchored.is_absolute() {
        anchored
    } else {
        std::env::current_dir().unwrap_or_default().join(anchored)
    };
    normalize(&absolute)
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };
    if path == Path::new("~") {
        home
    } else if let Ok(rest) = path.strip_prefix("~") {
        // "~user" forms are a single component and never reach here.
        home.join(rest)
    } else {
        path.to_path_buf()
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Depth counter for reentrant open/close scopes.
///
/// Senders hold one of these and perform the real acquire only on the 0 to 1
/// transition and the real release only on the 1 to 0 transition, so nested
/// scopes collapse to a single open/close pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeDepth(u32);

impl ScopeDepth {
    /// Creates a counter at depth zero.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Returns true when no scope is currently open.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        self.0 == 0
    }

    /// Records one scope entry.
    ///
    /// Callers acquire the real resource before calling this, so a failed
    /// acquire leaves the counter at zero.
    pub fn enter(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    /// Records one scope exit, returning true when the real release is due.
    ///
    /// Exiting at depth zero is a no-op and returns false.
    pub fn exit(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        self.0 == 0
    }
}
