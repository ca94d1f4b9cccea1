//! # mailout-smtp
//!
//! A small, synchronous SMTP client implementing the slice of RFC 5321 that
//! message submission needs: EHLO, STARTTLS, AUTH (PLAIN and LOGIN),
//! MAIL FROM, RCPT TO, DATA, QUIT.
//!
//! Connection state is tracked in the type system: each protocol step
//! consumes the client and returns it in the next state, so a transaction
//! that compiles is a transaction in a valid order.
//!
//! ```ignore
//! use mailout_smtp::Client;
//!
//! fn main() -> mailout_smtp::Result<()> {
//!     let client = Client::connect("smtp.example.com", 587)?
//!         .starttls()?
//!         .auth("user@example.com", "password")?;
//!
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let client = client
//!         .mail_from("sender@example.com")?
//!         .rcpt_to("recipient@example.com")?
//!         .data(message)?;
//!
//!     client.quit()?;
//!     Ok(())
//! }
//! ```
//!
//! All I/O is blocking; callers that need timeouts or concurrency wrap the
//! calls themselves.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod command;
mod error;
pub mod extension;
pub mod reply;
pub mod stream;

pub use client::{Authenticated, Client, Connected, MailTransaction, RecipientAdded, ServerInfo};
pub use command::Command;
pub use error::{Error, Result};
pub use extension::{AuthMechanism, Extension};
pub use reply::{Reply, ReplyCode};
pub use stream::{SmtpStream, connect, connect_tls};
