//! A sender that discards everything it is given.

use super::{Sender, log_subject};
use crate::error::Result;
use crate::message::Message;
use crate::registry::ConfigMap;
use crate::util::resolve_path;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sending method that drops messages on the floor.
#[derive(Debug, Clone)]
pub struct NullSender {
    configpath: Option<PathBuf>,
}

impl NullSender {
    /// Builds the sender from its configuration table.
    #[must_use]
    pub fn from_spec(_data: &ConfigMap, configpath: Option<&Path>) -> Self {
        Self {
            configpath: configpath.map(|p| resolve_path(p, None)),
        }
    }
}

impl Sender for NullSender {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        info!("Discarding e-mail {:?}", log_subject(message));
        Ok(())
    }

    fn configpath(&self) -> Option<&Path> {
        self.configpath.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_send_discards() {
        let mut sender = NullSender::from_spec(&Map::new(), None);
        sender.open().unwrap();
        sender
            .send(&Message::from("Subject: into the void\r\n\r\nhello\r\n"))
            .unwrap();
        sender.close().unwrap();
    }

    #[test]
    fn test_send_outside_scope() {
        let mut sender = NullSender::from_spec(&Map::new(), None);
        sender.send(&Message::from("\r\nbody\r\n")).unwrap();
    }

    #[test]
    fn test_configpath_is_resolved() {
        let sender = NullSender::from_spec(&Map::new(), Some(Path::new("rel/cfg.toml")));
        let configpath = sender.configpath().unwrap();
        assert!(configpath.is_absolute());
        assert!(configpath.ends_with("rel/cfg.toml"));
    }
}
