//! # mailout-core
//!
//! Configuration-driven email sending.
//!
//! This crate provides:
//! - Config file loading (TOML and JSON) with section extraction and fallback
//! - A sending-method registry that turns config tables into ready senders
//! - Password resolution schemes (env, file, base64, dotenv, netrc, keyring)
//! - Delivery backends: null, command, mbox, Maildir, and SMTP
//! - A minimal message model for extracting envelope data from raw messages
//!
//! The entry points are [`from_config_file`] and [`from_dict`], which produce a
//! boxed [`Sender`]. Custom sending methods and password schemes register
//! through [`SenderRegistry`] and [`SchemeRegistry`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod message;
pub mod netrc;
pub mod passwords;
pub mod registry;
pub mod senders;
pub mod util;

pub use config::{CredentialSpec, Credentials, FieldSet, FieldSource, NetrcField, PasswordField};
pub use error::{
    Error, InvalidConfigError, InvalidPasswordError, MissingConfigError, NetrcLookupError,
    NetrcParseError, Result,
};
pub use message::Message;
pub use netrc::lookup_netrc;
pub use passwords::{PasswordContext, SchemeHandler, SchemeRegistry, resolve_password};
pub use registry::{
    ConfigMap, DEFAULT_CONFIG_SECTION, SenderFactory, SenderRegistry, from_config_file, from_dict,
    get_default_configpath,
};
pub use senders::{
    CommandSender, MaildirSender, MboxSender, NullSender, Sender, SmtpSender, SmtpSecurity,
};
pub use util::{ScopeDepth, resolve_path};
