//! Type-state SMTP client.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::extension::{AuthMechanism, Extension};
use crate::reply::{self, Reply, ReplyCode};
use crate::stream::{self, SmtpStream};
use base64::Engine;
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::debug;

/// Name this client introduces itself with in EHLO.
const CLIENT_NAME: &str = "localhost";

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// What the server told us about itself during the greeting and EHLO.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    hostname: String,
    extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// The name the server announced in its greeting.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Capabilities advertised in the last EHLO response.
    #[must_use]
    pub const fn extensions(&self) -> &HashSet<Extension> {
        &self.extensions
    }

    /// Whether the server offers a STARTTLS upgrade.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.extensions.contains(&Extension::StartTls)
    }

    /// Authentication mechanisms the server advertised and this client knows.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|extension| match extension {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_name: String,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl Client<Connected> {
    /// Connects over plain TCP, reads the greeting, and sends EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, the greeting is not a
    /// success, or EHLO is rejected.
    pub fn connect(hostname: &str, port: u16) -> Result<Self> {
        let stream = stream::connect(hostname, port)?;
        Self::setup(stream, hostname)
    }

    /// Connects with implicit TLS, reads the greeting, and sends EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails, the greeting
    /// is not a success, or EHLO is rejected.
    pub fn connect_tls(hostname: &str, port: u16) -> Result<Self> {
        let stream = stream::connect_tls(hostname, port)?;
        Self::setup(stream, hostname)
    }

    fn setup(mut stream: SmtpStream, server_name: &str) -> Result<Self> {
        let greeting = Self::read_reply(&mut stream)?;
        if !greeting.is_success() {
            return Err(Error::smtp_error(
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }

        // Extract hostname from greeting (first word after code)
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        let mut client = Self {
            stream,
            server_name: server_name.to_string(),
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            _state: PhantomData,
        };
        client.ehlo()?;
        Ok(client)
    }

    /// Sends EHLO and records the advertised capabilities.
    fn ehlo(&mut self) -> Result<()> {
        let cmd = Command::Ehlo {
            hostname: CLIENT_NAME.to_string(),
        };
        let reply = self.send_command(cmd)?;

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        // Parse extensions from EHLO response (skip first line which is greeting)
        let mut extensions = HashSet::new();
        for line in reply.message.iter().skip(1) {
            extensions.insert(Extension::parse(line));
        }

        self.server_info.extensions = extensions;
        Ok(())
    }

    /// Upgrades the connection to TLS using STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub fn starttls(mut self) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(Command::StartTls)?;
        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        let server_name = self.server_name.clone();
        self.stream = self.stream.upgrade_to_tls(&server_name)?;

        // Capabilities can change across the upgrade, so ask again
        self.ehlo()?;
        Ok(self)
    }

    /// Authenticates with the strongest mechanism both sides understand.
    ///
    /// # Errors
    ///
    /// Returns an error if the server advertised no usable mechanism or if
    /// authentication fails.
    pub fn auth(self, username: &str, password: &str) -> Result<Client<Authenticated>> {
        let mechanisms = self.server_info.auth_mechanisms();
        if mechanisms.contains(&AuthMechanism::Plain) {
            self.auth_plain(username, password)
        } else if mechanisms.contains(&AuthMechanism::Login) {
            self.auth_login(username, password)
        } else {
            Err(Error::NotSupported("AUTH".into()))
        }
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub fn auth_plain(mut self, username: &str, password: &str) -> Result<Client<Authenticated>> {
        // Build PLAIN response: \0username\0password
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain.as_str().to_string(),
            initial_response: Some(encoded),
        };
        let reply = self.send_command(cmd)?;

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(Client {
            stream: self.stream,
            server_name: self.server_name,
            server_info: self.server_info,
            _state: PhantomData,
        })
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub fn auth_login(mut self, username: &str, password: &str) -> Result<Client<Authenticated>> {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login.as_str().to_string(),
            initial_response: None,
        };
        let mut reply = self.send_command(cmd)?;

        for part in [username, password] {
            if reply.code != ReplyCode::AUTH_CONTINUE {
                return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
            }
            let data = base64::engine::general_purpose::STANDARD.encode(part.as_bytes());
            reply = self.send_command(Command::AuthData { data })?;
        }

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(Client {
            stream: self.stream,
            server_name: self.server_name,
            server_info: self.server_info,
            _state: PhantomData,
        })
    }

    /// Starts a mail transaction without authentication (if server allows).
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub fn mail_from(mut self, address: &str) -> Result<Client<MailTransaction>> {
        let cmd = Command::MailFrom {
            address: address.to_string(),
        };
        let reply = self.send_command(cmd)?;

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(Client {
            stream: self.stream,
            server_name: self.server_name,
            server_info: self.server_info,
            _state: PhantomData,
        })
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub fn mail_from(mut self, address: &str) -> Result<Client<MailTransaction>> {
        let cmd = Command::MailFrom {
            address: address.to_string(),
        };
        let reply = self.send_command(cmd)?;

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(Client {
            stream: self.stream,
            server_name: self.server_name,
            server_info: self.server_info,
            _state: PhantomData,
        })
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub fn rcpt_to(mut self, address: &str) -> Result<Client<RecipientAdded>> {
        let cmd = Command::RcptTo {
            address: address.to_string(),
        };
        let reply = self.send_command(cmd)?;

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(Client {
            stream: self.stream,
            server_name: self.server_name,
            server_info: self.server_info,
            _state: PhantomData,
        })
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub fn rcpt_to(mut self, address: &str) -> Result<Self> {
        let cmd = Command::RcptTo {
            address: address.to_string(),
        };
        let reply = self.send_command(cmd)?;

        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(self)
    }

    /// Sends the message content and completes the transaction.
    ///
    /// Message should be RFC 5322 formatted. Line endings are normalized to
    /// CRLF and leading dots are byte-stuffed; the terminating "." line is
    /// added automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails, sending the payload
    /// fails, or the server rejects the message.
    pub fn data(mut self, message: &[u8]) -> Result<Client<Connected>> {
        let reply = self.send_command(Command::Data)?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        self.write_payload(message)?;

        let reply = Self::read_reply(&mut self.stream)?;
        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(Client {
            stream: self.stream,
            server_name: self.server_name,
            server_info: self.server_info,
            _state: PhantomData,
        })
    }

    fn write_payload(&mut self, message: &[u8]) -> Result<()> {
        let mut lines = message.split(|&byte| byte == b'\n').peekable();
        while let Some(line) = lines.next() {
            // A trailing newline yields one final empty piece, which is
            // not a line of its own.
            if line.is_empty() && lines.peek().is_none() {
                break;
            }
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            // Byte-stuff lines starting with '.'
            if line.first() == Some(&b'.') {
                self.stream.write_all(b".")?;
            }
            self.stream.write_all(line)?;
            self.stream.write_all(b"\r\n")?;
        }

        // Send terminating sequence
        self.stream.write_all(b".\r\n")?;
        Ok(())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        debug!("C: {}", cmd.name());
        self.stream.write_all(&cmd.serialize())?;
        let reply = Self::read_reply(&mut self.stream)?;
        debug!("S: {}", reply.code);
        Ok(reply)
    }

    fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let Some(line) = stream.read_line()? else {
                return Err(Error::ConnectionClosed);
            };
            if line.is_empty() {
                continue;
            }

            let is_last = reply::is_last_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        Reply::parse(&lines)
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit)?;

        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        Ok(())
    }
}
