//! Server replies and reply codes.

use crate::error::{Error, Result};
use std::fmt;

/// A three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220: service ready.
    pub const SERVICE_READY: Self = Self(220);
    /// 221: service closing transmission channel.
    pub const CLOSING: Self = Self(221);
    /// 235: authentication successful.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250: requested action completed.
    pub const OK: Self = Self(250);
    /// 334: server challenge during authentication.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354: start mail input.
    pub const START_DATA: Self = Self(354);
    /// 535: authentication credentials invalid.
    pub const AUTH_FAILED: Self = Self(535);

    /// Creates a reply code from its numeric value.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true for 2xx codes.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true for 3xx codes (more input expected).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true for 4xx codes.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true for 5xx codes.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete server reply, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The reply code from the first line.
    pub code: ReplyCode,
    /// Message text, one entry per reply line.
    pub message: Vec<String>,
}

impl Reply {
    /// Assembles a reply from its raw lines.
    ///
    /// # Errors
    ///
    /// Fails when the reply is empty or a line does not start with a
    /// three-digit code.
    pub fn parse(lines: &[String]) -> Result<Self> {
        let mut code = None;
        let mut message = Vec::new();
        for line in lines {
            let digits = line
                .get(..3)
                .and_then(|digits| digits.parse::<u16>().ok())
                .ok_or_else(|| Error::Protocol(format!("malformed reply line: {line:?}")))?;
            if code.is_none() {
                code = Some(digits);
            }
            message.push(line.get(4..).unwrap_or("").to_string());
        }
        let Some(code) = code else {
            return Err(Error::Protocol("empty reply".to_string()));
        };
        Ok(Self {
            code: ReplyCode::new(code),
            message,
        })
    }

    /// Returns true when the reply code is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// The message lines joined into one string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join(" ")
    }
}

/// Whether a received line is the final line of its reply.
///
/// Non-final lines carry a `-` after the code; the final line has a space
/// there, or nothing at all.
#[must_use]
pub fn is_last_line(line: &str) -> bool {
    line.len() == 3 || line.as_bytes().get(3) == Some(&b' ')
}
