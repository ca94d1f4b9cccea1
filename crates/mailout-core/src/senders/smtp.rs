//! Sending through an SMTP relay.

use super::{Sender, log_subject, send_scoped};
use crate::config::{CredentialSpec, Credentials};
use crate::error::{Error, InvalidConfigError, Result};
use crate::message::Message;
use crate::registry::ConfigMap;
use crate::util::{ScopeDepth, resolve_path};
use mailout_smtp::{Authenticated, Client, Connected};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::{self, Deserializer};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Transport security for the SMTP connection.
///
/// Spelled `false` | `true` | `"starttls"` in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Plain TCP, no TLS at any point.
    #[default]
    None,
    /// Implicit TLS from the first byte.
    Tls,
    /// Plain TCP upgraded in-band with STARTTLS.
    StartTls,
}

impl SmtpSecurity {
    /// The conventional port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::Tls => 465,
            Self::StartTls => 587,
        }
    }
}

impl<'de> Deserialize<'de> for SmtpSecurity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SecurityVisitor;

        impl de::Visitor<'_> for SecurityVisitor {
            type Value = SmtpSecurity;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a boolean or the string \"starttls\"")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(if value {
                    SmtpSecurity::Tls
                } else {
                    SmtpSecurity::None
                })
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value == "starttls" {
                    Ok(SmtpSecurity::StartTls)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(value), &self))
                }
            }
        }

        deserializer.deserialize_any(SecurityVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct SmtpSpec {
    #[serde(flatten)]
    credentials: CredentialSpec,
    /// Zero means "derive from the security mode".
    #[serde(default)]
    port: u16,
    #[serde(default, rename = "ssl")]
    security: SmtpSecurity,
}

/// One live SMTP session, remembering whether AUTH has happened.
enum Session {
    Plain(Client<Connected>),
    Authed(Client<Authenticated>),
}

/// Sending method that relays messages through an SMTP server.
///
/// The connection is established once per open scope and reused for every
/// send inside it; closing the scope QUITs.
pub struct SmtpSender {
    configpath: Option<PathBuf>,
    credentials: Credentials,
    port: u16,
    security: SmtpSecurity,
    depth: ScopeDepth,
    session: Option<Session>,
}

impl fmt::Debug for SmtpSender {
    // Hand-written: Session holds a live connection with no Debug of its
    // own. The password field is a SecretString and renders redacted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSender")
            .field("configpath", &self.configpath)
            .field("credentials", &self.credentials)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("depth", &self.depth)
            .field("connected", &self.session.is_some())
            .finish()
    }
}

impl SmtpSender {
    /// Builds the sender from its configuration table, resolving the
    /// credential set up front.
    ///
    /// # Errors
    ///
    /// Fails when the table does not fit the model or when credential
    /// resolution rejects it.
    pub fn from_spec(data: &ConfigMap, configpath: Option<&Path>) -> Result<Self> {
        let spec: SmtpSpec = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|err| InvalidConfigError::new(err.to_string()))?;
        let configpath = configpath.map(|p| resolve_path(p, None));
        let port = if spec.port == 0 {
            spec.security.default_port()
        } else {
            spec.port
        };
        let credentials = spec.credentials.resolve(configpath.as_deref())?;
        Ok(Self {
            configpath,
            credentials,
            port,
            security: spec.security,
            depth: ScopeDepth::new(),
            session: None,
        })
    }

    fn connect(&self) -> Result<Session> {
        let host = &self.credentials.host;
        let client = match self.security {
            SmtpSecurity::Tls => Client::connect_tls(host, self.port)?,
            SmtpSecurity::StartTls => Client::connect(host, self.port)?.starttls()?,
            SmtpSecurity::None => Client::connect(host, self.port)?,
        };
        match (&self.credentials.username, &self.credentials.password) {
            (Some(username), Some(password)) => {
                Ok(Session::Authed(client.auth(username, password.expose_secret())?))
            }
            _ => Ok(Session::Plain(client)),
        }
    }

    fn deliver(&mut self, message: &Message) -> Result<()> {
        let Some((first, rest)) = message.recipients().split_first() else {
            return Err(Error::UnsupportedEmail(
                "no recipients found in message headers".into(),
            ));
        };
        let session = self
            .session
            .take()
            .ok_or(Error::Smtp(mailout_smtp::Error::ConnectionClosed))?;

        // A failed transaction drops the connection; later sends in the
        // same scope then report it closed.
        let sender = message.envelope_sender().unwrap_or("");
        let transaction = match session {
            Session::Plain(client) => client.mail_from(sender)?,
            Session::Authed(client) => client.mail_from(sender)?,
        };
        let mut transaction = transaction.rcpt_to(first)?;
        for recipient in rest {
            transaction = transaction.rcpt_to(recipient)?;
        }
        let client = transaction.data(message.as_bytes())?;
        self.session = Some(Session::Plain(client));
        Ok(())
    }
}

impl Sender for SmtpSender {
    fn open(&mut self) -> Result<()> {
        if self.depth.is_closed() {
            debug!(
                "Connecting to {}:{} ({:?})",
                self.credentials.host, self.port, self.security
            );
            self.session = Some(self.connect()?);
        }
        self.depth.enter();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.depth.exit() {
            debug!("Closing connection to {}", self.credentials.host);
            if let Some(session) = self.session.take() {
                match session {
                    Session::Plain(client) => client.quit()?,
                    Session::Authed(client) => client.quit()?,
                }
            }
        }
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        info!(
            "Sending e-mail {:?} to {}:{}",
            log_subject(message),
            self.credentials.host,
            self.port
        );
        send_scoped(self, |sender| sender.deliver(message))
    }

    fn configpath(&self) -> Option<&Path> {
        self.configpath.as_deref()
    }
}
