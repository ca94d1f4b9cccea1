//! Appending to an mbox file.

use super::{Sender, log_subject, send_scoped};
use crate::error::{InvalidConfigError, Result};
use crate::message::Message;
use crate::registry::ConfigMap;
use crate::util::{ScopeDepth, resolve_path};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct MboxSpec {
    path: PathBuf,
}

/// A dot-lock on a mailbox file.
///
/// Created exclusively; a lock file left behind by another writer makes
/// acquisition fail rather than wait.
#[derive(Debug)]
struct DotLock {
    lockfile: PathBuf,
}

impl DotLock {
    fn acquire(path: &Path) -> std::io::Result<Self> {
        let mut name = path.as_os_str().to_owned();
        name.push(".lock");
        let lockfile = PathBuf::from(name);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lockfile)?;
        Ok(Self { lockfile })
    }

    fn release(self) -> std::io::Result<()> {
        fs::remove_file(&self.lockfile)
    }
}

/// Sending method that appends messages to a local mbox file.
///
/// The file is dot-locked for the duration of the sender's scope and
/// created on first delivery if it does not yet exist.
#[derive(Debug)]
pub struct MboxSender {
    configpath: Option<PathBuf>,
    path: PathBuf,
    depth: ScopeDepth,
    lock: Option<DotLock>,
}

impl MboxSender {
    /// Builds the sender from its configuration table.
    ///
    /// # Errors
    ///
    /// Fails when the `path` field is missing or not a string.
    pub fn from_spec(data: &ConfigMap, configpath: Option<&Path>) -> Result<Self> {
        let spec: MboxSpec = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|err| InvalidConfigError::new(err.to_string()))?;
        let configpath = configpath.map(|p| resolve_path(p, None));
        let path = resolve_path(&spec.path, configpath.as_deref());
        Ok(Self {
            configpath,
            path,
            depth: ScopeDepth::new(),
            lock: None,
        })
    }

    fn append(&mut self, message: &Message) -> Result<()> {
        info!(
            "Adding e-mail {:?} to mbox at {}",
            log_subject(message),
            self.path.display()
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let sender = message.envelope_sender().unwrap_or("MAILER-DAEMON");
        let date = Utc::now().format("%a %b %e %H:%M:%S %Y");
        writeln!(file, "From {sender} {date}")?;
        for line in message.as_bytes().split_inclusive(|&b| b == b'\n') {
            if line.starts_with(b"From ") {
                file.write_all(b">")?;
            }
            file.write_all(line)?;
        }
        if !message.as_bytes().ends_with(b"\n") {
            file.write_all(b"\n")?;
        }
        file.write_all(b"\n")?;
        Ok(())
    }
}

impl Sender for MboxSender {
    fn open(&mut self) -> Result<()> {
        if self.depth.is_closed() {
            debug!("Opening mbox at {}", self.path.display());
            self.lock = Some(DotLock::acquire(&self.path)?);
        }
        self.depth.enter();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.depth.exit() {
            debug!("Closing mbox at {}", self.path.display());
            if let Some(lock) = self.lock.take() {
                lock.release()?;
            }
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
