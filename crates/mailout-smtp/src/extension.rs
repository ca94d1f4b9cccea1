//! EHLO capability parsing.

/// Authentication mechanisms this client can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// RFC 4616 PLAIN: one base64 blob carrying both identity and password.
    Plain,
    /// LOGIN: username and password in separate challenge rounds.
    Login,
}

impl AuthMechanism {
    /// Recognizes a mechanism name from an AUTH capability listing.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            _ => None,
        }
    }

    /// The mechanism name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

/// A capability advertised in an EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS: the connection may be upgraded to TLS.
    StartTls,
    /// AUTH with the advertised mechanisms this client recognizes.
    Auth(Vec<AuthMechanism>),
    /// 8BITMIME message bodies.
    EightBitMime,
    /// SIZE with the advertised limit, when one was given.
    Size(Option<u64>),
    /// PIPELINING of commands.
    Pipelining,
    /// SMTPUTF8 addresses and headers.
    SmtpUtf8,
    /// Anything else, by its keyword.
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO response line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Self::Unknown(String::new());
        };
        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(words.filter_map(AuthMechanism::parse).collect()),
            "8BITMIME" => Self::EightBitMime,
            "SIZE" => Self::Size(words.next().and_then(|word| word.parse().ok())),
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(keyword.to_string()),
        }
    }
}
