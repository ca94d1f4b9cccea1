//! Delivering into a Maildir.

use super::{Sender, log_subject, send_scoped};
use crate::error::{InvalidConfigError, Result};
use crate::message::Message;
use crate::registry::ConfigMap;
use crate::util::{ScopeDepth, resolve_path};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct MaildirSpec {
    path: PathBuf,
    #[serde(default)]
    folder: Option<String>,
}

/// Sending method that writes messages into a Maildir, optionally into one
/// of its dot-folders.
///
/// The directory structure is created on first entry; folders named in the
/// configuration are created as `.folder` subdirectories with a
/// `maildirfolder` marker, Maildir++ style.
#[derive(Debug)]
pub struct MaildirSender {
    configpath: Option<PathBuf>,
    path: PathBuf,
    folder: Option<String>,
    depth: ScopeDepth,
    sequence: u32,
}

impl MaildirSender {
    /// Builds the sender from its configuration table.
    ///
    /// # Errors
    ///
    /// Fails when the `path` field is missing or the `folder` field is not
    /// a string.
    pub fn from_spec(data: &ConfigMap, configpath: Option<&Path>) -> Result<Self> {
        let spec: MaildirSpec = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|err| InvalidConfigError::new(err.to_string()))?;
        let configpath = configpath.map(|p| resolve_path(p, None));
        let path = resolve_path(&spec.path, configpath.as_deref());
        Ok(Self {
            configpath,
            path,
            folder: spec.folder,
            depth: ScopeDepth::new(),
            sequence: 0,
        })
    }

    fn describe(&self) -> String {
        match &self.folder {
            None => format!("Maildir at {}, root folder", self.path.display()),
            Some(folder) => {
                format!("Maildir at {}, folder {folder:?}", self.path.display())
            }
        }
    }

    /// Directory messages are delivered into.
    fn mailbox_root(&self) -> PathBuf {
        match &self.folder {
            None => self.path.clone(),
            Some(folder) => self.path.join(format!(".{folder}")),
        }
    }

    fn ensure_structure(&self) -> std::io::Result<()> {
        create_maildir(&self.path)?;
        if self.folder.is_some() {
            let subdir = self.mailbox_root();
            let created = !subdir.is_dir();
            create_maildir(&subdir)?;
            if created {
                fs::write(subdir.join("maildirfolder"), b"")?;
            }
        }
        Ok(())
    }

    fn append(&mut self, message: &Message) -> Result<()> {
        info!(
            "Adding e-mail {:?} to {}",
            log_subject(message),
            self.describe()
        );
        let base = self.mailbox_root();
        let name = self.unique_name();
        let tmpfile = base.join("tmp").join(&name);
        fs::write(&tmpfile, message.as_bytes())?;
        fs::rename(&tmpfile, base.join("new").join(&name))?;
        Ok(())
    }

    fn unique_name(&mut self) -> String {
        self.sequence = self.sequence.wrapping_add(1);
        let now = Utc::now();
        let host = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        let host = host.replace(['/', ':'], "-");
        format!(
            "{}.M{}P{}Q{}.{}",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            std::process::id(),
            self.sequence,
            host
        )
    }
}

fn create_maildir(root: &Path) -> std::io::Result<()> {
    for subdir in ["tmp", "new", "cur"] {
        fs::create_dir_all(root.join(subdir))?;
    }
    Ok(())
}

impl Sender for MaildirSender {
    fn open(&mut self) -> Result<()> {
        if self.depth.is_closed() {
            debug!("Opening {}", self.describe());
            self.ensure_structure()?;
        }
        self.depth.enter();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.depth.exit() {
            debug!("Closing {}", self.describe());
        }
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        send_scoped(self, |sender| sender.append(message))
    }

    fn configpath(&self) -> Option<&Path> {
        self.configpath.as_deref()
    }
}
