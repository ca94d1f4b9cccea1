//! E-mail messages as raw bytes plus an extracted envelope.
//!
//! Senders transmit the message bytes untouched. The envelope fields used
//! for routing and logging come from a single pass over the header block:
//! the sender from `Sender` falling back to `From`, the recipients from
//! `To`, `Cc`, and `Bcc` in that order.

use std::collections::HashMap;

/// A message to send: the raw bytes and the envelope read from its headers.
#[derive(Debug, Clone)]
pub struct Message {
    raw: Vec<u8>,
    sender: Option<String>,
    recipients: Vec<String>,
    subject: Option<String>,
}

impl Message {
    /// Wraps raw message bytes, extracting the envelope from the headers.
    ///
    /// Messages without usable headers still construct; their envelope is
    /// simply empty, and senders that need one report that at send time.
    #[must_use]
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&raw);
        let headers = parse_headers(&text);
        let sender = ["sender", "from"]
            .iter()
            .filter_map(|name| headers.get(*name))
            .flat_map(|values| values.iter())
            .flat_map(|value| extract_addresses(value))
            .next();
        let mut recipients = Vec::new();
        for name in ["to", "cc", "bcc"] {
            if let Some(values) = headers.get(name) {
                for value in values {
                    recipients.extend(extract_addresses(value));
                }
            }
        }
        let subject = headers
            .get("subject")
            .and_then(|values| values.first())
            .cloned();
        Self {
            raw,
            sender,
            recipients,
            subject,
        }
    }

    /// The raw message bytes, exactly as given.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The envelope sender address, from `Sender` falling back to `From`.
    #[must_use]
    pub fn envelope_sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// The envelope recipient addresses, from `To`, `Cc`, and `Bcc`.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// The `Subject` header value, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

impl From<Vec<u8>> for Message {
    fn from(raw: Vec<u8>) -> Self {
        Self::from_bytes(raw)
    }
}

impl From<&[u8]> for Message {
    fn from(raw: &[u8]) -> Self {
        Self::from_bytes(raw.to_vec())
    }
}

impl From<&str> for Message {
    fn from(raw: &str) -> Self {
        Self::from_bytes(raw.as_bytes().to_vec())
    }
}

impl From<String> for Message {
    fn from(raw: String) -> Self {
        Self::from_bytes(raw.into_bytes())
    }
}

/// Parses the header block, unfolding continuation lines and lowercasing
/// names. Stops at the first empty line; the body is never scanned.
fn parse_headers(text: &str) -> HashMap<String, Vec<String>> {
    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    let mut current_name: Option<String> = None;
    let mut current_value = String::new();

    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if current_name.is_some() {
                current_value.push(' ');
                current_value.push_str(line.trim());
            }
        } else {
            if let Some(name) = current_name.take() {
                headers.entry(name).or_default().push(current_value.trim().to_string());
                current_value.clear();
            }
            if let Some((name, value)) = line.split_once(':') {
                current_name = Some(name.trim().to_lowercase());
                current_value = value.trim().to_string();
            }
        }
    }
    if let Some(name) = current_name {
        headers.entry(name).or_default().push(current_value.trim().to_string());
    }
    headers
}

/// Pulls bare addresses out of an address-list header value.
///
/// Splits on commas and takes the angle-bracketed part of each entry when
/// present, the whole entry otherwise. Quoted display names containing
/// commas are not handled; the addresses themselves still come out right
/// as long as they are bracketed.
fn extract_addresses(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            if let (Some(start), Some(end)) = (part.find('<'), part.rfind('>')) {
                if start < end {
                    let addr = part[start + 1..end].trim();
                    return (!addr.is_empty()).then(|| addr.to_string());
                }
            }
            Some(part.to_string())
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_from_headers() {
        let msg = Message::from(concat!(
            "From: Mister Sender <sender@example.com>\r\n",
            "To: recip@example.com, Another One <two@example.org>\r\n",
            "Subject: Meet up\r\n",
            "\r\n",
            "Body text.\r\n",
        ));
        assert_eq!(msg.envelope_sender(), Some("sender@example.com"));
        assert_eq!(
            msg.recipients(),
            ["recip@example.com", "two@example.org"]
        );
        assert_eq!(msg.subject(), Some("Meet up"));
    }

    #[test]
    fn test_sender_header_wins_over_from() {
        let msg = Message::from(concat!(
            "From: from@example.com\r\n",
            "Sender: actual@example.com\r\n",
            "To: recip@example.com\r\n",
            "\r\n",
        ));
        assert_eq!(msg.envelope_sender(), Some("actual@example.com"));
    }

    #[test]
    fn test_cc_and_bcc_are_recipients() {
        let msg = Message::from(concat!(
            "From: from@example.com\r\n",
            "To: one@example.com\r\n",
            "Cc: two@example.com\r\n",
            "Bcc: three@example.com\r\n",
            "\r\n",
        ));
        assert_eq!(
            msg.recipients(),
            ["one@example.com", "two@example.com", "three@example.com"]
        );
    }

    #[test]
    fn test_folded_header_unfolds() {
        let msg = Message::from(concat!(
            "To: one@example.com,\r\n",
            " two@example.com\r\n",
            "\r\n",
        ));
        assert_eq!(msg.recipients(), ["one@example.com", "two@example.com"]);
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let msg = Message::from("FROM: a@b.example\r\nTO: c@d.example\r\n\r\n");
        assert_eq!(msg.envelope_sender(), Some("a@b.example"));
        assert_eq!(msg.recipients(), ["c@d.example"]);
    }

    #[test]
    fn test_body_is_not_scanned() {
        let msg = Message::from(concat!(
            "From: real@example.com\r\n",
            "\r\n",
            "To: fake@example.com\r\n",
        ));
        assert_eq!(msg.envelope_sender(), Some("real@example.com"));
        assert!(msg.recipients().is_empty());
    }

    #[test]
    fn test_headerless_message_has_empty_envelope() {
        let msg = Message::from_bytes(b"just some bytes".to_vec());
        assert_eq!(msg.envelope_sender(), None);
        assert!(msg.recipients().is_empty());
        assert_eq!(msg.subject(), None);
    }

    #[test]
    fn test_raw_bytes_are_untouched() {
        let raw = b"From: a@b.example\r\n\r\nhello \xff world".to_vec();
        let msg = Message::from_bytes(raw.clone());
        assert_eq!(msg.as_bytes(), raw.as_slice());
    }

    #[test]
    fn test_empty_address_entries_are_dropped() {
        let msg = Message::from("To: , one@example.com,\r\n\r\n");
        assert_eq!(msg.recipients(), ["one@example.com"]);
    }

    #[test]
    fn test_lf_only_line_endings() {
        let msg = Message::from("From: a@b.example\nTo: c@d.example\n\nbody\n");
        assert_eq!(msg.envelope_sender(), Some("a@b.example"));
        assert_eq!(msg.recipients(), ["c@d.example"]);
    }
}
