//! SMTP commands.

/// A command the client can send, already carrying its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Extended greeting with the client hostname.
    Ehlo {
        /// Name this client identifies itself as.
        hostname: String,
    },
    /// Request a TLS upgrade of the current connection.
    StartTls,
    /// Begin authentication with the given mechanism.
    Auth {
        /// Mechanism name as advertised by the server.
        mechanism: String,
        /// Initial response, pre-encoded, when the mechanism allows one.
        initial_response: Option<String>,
    },
    /// A raw continuation line during an authentication exchange.
    AuthData {
        /// Pre-encoded payload for the current challenge.
        data: String,
    },
    /// Start a mail transaction with the given envelope sender.
    MailFrom {
        /// Envelope sender, without angle brackets. May be empty.
        address: String,
    },
    /// Add an envelope recipient to the current transaction.
    RcptTo {
        /// Recipient address, without angle brackets.
        address: String,
    },
    /// Announce the message payload.
    Data,
    /// End the session.
    Quit,
}

impl Command {
    /// Renders the command as a wire-ready line, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response: Some(response),
            } => format!("AUTH {mechanism} {response}"),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {mechanism}"),
            Self::AuthData { data } => data.clone(),
            Self::MailFrom { address } => format!("MAIL FROM:<{address}>"),
            Self::RcptTo { address } => format!("RCPT TO:<{address}>"),
            Self::Data => "DATA".to_string(),
            Self::Quit => "QUIT".to_string(),
        };
        let mut bytes = line.into_bytes();
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    /// Command keyword for logging. Never includes credentials.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::AuthData { .. } => "AUTH (continued)",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        }
    }
}
