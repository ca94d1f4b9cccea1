//! Piping messages to an external command.

use super::{Sender, log_subject};
use crate::error::{Error, InvalidConfigError, Result};
use crate::message::Message;
use crate::registry::ConfigMap;
use crate::util::resolve_path;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{self, Stdio};
use tracing::info;

/// The command to run: a shell line or an argv list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    /// Run through `sh -c`.
    Shell(String),
    /// Run directly with the given arguments.
    Argv(Vec<String>),
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::Argv(vec![
            "sendmail".to_string(),
            "-i".to_string(),
            "-t".to_string(),
        ])
    }
}

impl CommandLine {
    fn to_process(&self) -> Result<process::Command, InvalidConfigError> {
        match self {
            Self::Shell(line) => {
                let mut command = process::Command::new("sh");
                command.arg("-c").arg(line);
                Ok(command)
            }
            Self::Argv(argv) => {
                let Some((program, args)) = argv.split_first() else {
                    return Err(InvalidConfigError::new("command list cannot be empty"));
                };
                let mut command = process::Command::new(program);
                command.args(args);
                Ok(command)
            }
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(line) => f.write_str(line),
            Self::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommandSpec {
    #[serde(default)]
    command: CommandLine,
}

/// Sending method that feeds each message to an external command on its
/// standard input.
#[derive(Debug, Clone)]
pub struct CommandSender {
    configpath: Option<PathBuf>,
    command: CommandLine,
}

impl CommandSender {
    /// Builds the sender from its configuration table.
    ///
    /// # Errors
    ///
    /// Fails when the `command` field is neither a string nor a list of
    /// strings, or is an empty list.
    pub fn from_spec(data: &ConfigMap, configpath: Option<&Path>) -> Result<Self> {
        let spec: CommandSpec = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|err| InvalidConfigError::new(err.to_string()))?;
        spec.command.to_process()?;
        Ok(Self {
            configpath: configpath.map(|p| resolve_path(p, None)),
            command: spec.command,
        })
    }

    fn run(&self, message: &Message) -> Result<()> {
        let mut child = self
            .command
            .to_process()?
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        // stdin is fed from its own thread while the output pipes are
        // drained; a command that echoes its input would otherwise wedge
        // against a full stdout pipe. A command that exits before reading
        // all of its input is reported through its exit status, not as a
        // pipe error.
        let stdin = child.stdin.take();
        let (output, write_outcome) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(message.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (output, writer.join().unwrap_or(Ok(())))
        });
        let output = output?;
        if let Err(err) = write_outcome {
            if err.kind() != ErrorKind::BrokenPipe {
                return Err(err.into());
            }
        }
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Command {
                command: self.command.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl Sender for CommandSender {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        info!(
            "Sending e-mail {:?} via command {:?}",
            log_subject(message),
            self.command.to_string()
        );
        self.run(message)
    }

    fn configpath(&self) -> Option<&Path> {
        self.configpath.as_deref()
    }
}
