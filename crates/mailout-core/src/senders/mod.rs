//! The built-in sending methods.

mod command;
mod maildir;
mod mbox;
mod null;
mod smtp;

pub use command::CommandSender;
pub use maildir::MaildirSender;
pub use mbox::MboxSender;
pub use null::NullSender;
pub use smtp::{SmtpSecurity, SmtpSender};

use crate::error::Result;
use crate::message::Message;
use std::fmt;

/// A sending method: a scoped resource that transmits messages.
///
/// `open` and `close` are reentrant. Entries are counted, and only the
/// outermost entry/exit pair touches the live resource, so `open`/`close`
/// pairs may nest freely. `send` wraps itself in such a pair: inside an
/// explicit scope it reuses the open resource, on its own it acquires and
/// releases around the single call.
///
/// Senders are `Debug` so a boxed one can show up in log lines and test
/// assertions; implementations must not leak credentials there.
pub trait Sender: fmt::Debug {
    /// Enters the sender's scope, acquiring its resource on first entry.
    ///
    /// # Errors
    ///
    /// Fails when the resource cannot be acquired.
    fn open(&mut self) -> Result<()>;

    /// Exits the sender's scope, releasing its resource on last exit.
    ///
    /// # Errors
    ///
    /// Fails when releasing the resource fails.
    fn close(&mut self) -> Result<()>;

    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Fails when the message cannot be delivered.
    fn send(&mut self, message: &Message) -> Result<()>;

    /// The configuration file this sender was built from, if any.
    fn configpath(&self) -> Option<&std::path::Path>;
}

/// Runs one delivery inside the sender's scope.
///
/// The scope is closed again even when delivery fails; the delivery error
/// takes precedence over any error from closing.
pub(crate) fn send_scoped<S, F>(sender: &mut S, deliver: F) -> Result<()>
where
    S: Sender + ?Sized,
    F: FnOnce(&mut S) -> Result<()>,
{
    sender.open()?;
    let outcome = deliver(sender);
    let closed = sender.close();
    outcome.and(closed)
}

/// Subject line for log output.
pub(crate) fn log_subject(message: &Message) -> &str {
    message.subject().unwrap_or("<NO SUBJECT>")
}
