//! Integration tests for the SMTP client.
//!
//! These tests run a scripted server on a loopback listener so whole
//! conversations can be driven without a real mail server.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use mailout_smtp::{Client, Error};

/// One step of a scripted conversation, from the server's point of view.
enum Step {
    /// Write these bytes to the client.
    Send(&'static str),
    /// Read one command line and record it.
    Read,
    /// Read a DATA payload up to the lone dot and record it verbatim.
    ReadBody,
}

/// Runs the script against the first connection and returns everything read.
fn start_server(script: Vec<Step>) -> (u16, JoinHandle<Vec<String>>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _addr) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let mut received = Vec::new();

        for step in script {
            match step {
                Step::Send(text) => {
                    writer.write_all(text.as_bytes()).unwrap();
                    writer.flush().unwrap();
                }
                Step::Read => {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    received.push(line.trim_end().to_string());
                }
                Step::ReadBody => {
                    let mut body = String::new();
                    loop {
                        let mut line = String::new();
                        reader.read_line(&mut line).unwrap();
                        if line.trim_end() == "." {
                            break;
                        }
                        body.push_str(&line);
                    }
                    received.push(body);
                }
            }
        }

        received
    });

    (port, handle)
}

#[test]
fn test_plain_session_delivers_message() {
    let (port, server) = start_server(vec![
        Step::Send("220 mail.example.com ESMTP ready\r\n"),
        Step::Read,
        Step::Send("250-mail.example.com\r\n250-8BITMIME\r\n250 SIZE 35882577\r\n"),
        Step::Read,
        Step::Send("250 OK\r\n"),
        Step::Read,
        Step::Send("250 OK\r\n"),
        Step::Read,
        Step::Send("354 go ahead\r\n"),
        Step::ReadBody,
        Step::Send("250 2.0.0 accepted\r\n"),
        Step::Read,
        Step::Send("221 closing\r\n"),
    ]);

    let client = Client::connect("127.0.0.1", port).unwrap();
    assert_eq!(client.server_info().hostname(), "mail.example.com");

    let client = client
        .mail_from("sender@example.com")
        .unwrap()
        .rcpt_to("recipient@example.com")
        .unwrap()
        .data(b"Subject: test\r\n\r\nBody line\n.starts with a dot\n")
        .unwrap();
    client.quit().unwrap();

    let received = server.join().unwrap();
    assert_eq!(
        received,
        [
            "EHLO localhost",
            "MAIL FROM:<sender@example.com>",
            "RCPT TO:<recipient@example.com>",
            // LF endings normalized to CRLF, leading dot stuffed
            "Subject: test\r\n\r\nBody line\r\n..starts with a dot\r\n",
            "QUIT",
        ]
    );
}

#[test]
fn test_multiple_recipients_and_null_sender() {
    let (port, server) = start_server(vec![
        Step::Send("220 mx.example.net ESMTP\r\n"),
        Step::Read,
        Step::Send("250 mx.example.net\r\n"),
        Step::Read,
        Step::Send("250 OK\r\n"),
        Step::Read,
        Step::Send("250 OK\r\n"),
        Step::Read,
        Step::Send("250 OK\r\n"),
        Step::Read,
        Step::Send("354 start\r\n"),
        Step::ReadBody,
        Step::Send("250 queued\r\n"),
        Step::Read,
        Step::Send("221 closing\r\n"),
    ]);

    let client = Client::connect("127.0.0.1", port).unwrap();
    let client = client
        .mail_from("")
        .unwrap()
        .rcpt_to("one@example.com")
        .unwrap()
        .rcpt_to("two@example.com")
        .unwrap()
        .data(b"Subject: hi\r\n\r\nhello\r\n")
        .unwrap();
    client.quit().unwrap();

    let received = server.join().unwrap();
    assert_eq!(received[1], "MAIL FROM:<>");
    assert_eq!(received[2], "RCPT TO:<one@example.com>");
    assert_eq!(received[3], "RCPT TO:<two@example.com>");
}

#[test]
fn test_auth_plain_uses_initial_response() {
    let (port, server) = start_server(vec![
        Step::Send("220 mail.example.com ESMTP\r\n"),
        Step::Read,
        Step::Send("250-mail.example.com\r\n250 AUTH PLAIN LOGIN\r\n"),
        Step::Read,
        Step::Send("235 2.7.0 accepted\r\n"),
        Step::Read,
        Step::Send("221 closing\r\n"),
    ]);

    let client = Client::connect("127.0.0.1", port).unwrap();
    let client = client.auth("user", "secret").unwrap();
    client.quit().unwrap();

    let received = server.join().unwrap();
    let expected = STANDARD.encode(b"\0user\0secret");
    assert_eq!(received[1], format!("AUTH PLAIN {expected}"));
}

#[test]
fn test_auth_login_round_trip() {
    let (port, server) = start_server(vec![
        Step::Send("220 mail.example.com ESMTP\r\n"),
        Step::Read,
        Step::Send("250-mail.example.com\r\n250 AUTH LOGIN\r\n"),
        Step::Read,
        Step::Send("334 VXNlcm5hbWU6\r\n"),
        Step::Read,
        Step::Send("334 UGFzc3dvcmQ6\r\n"),
        Step::Read,
        Step::Send("235 accepted\r\n"),
        Step::Read,
        Step::Send("221 closing\r\n"),
    ]);

    let client = Client::connect("127.0.0.1", port).unwrap();
    let client = client.auth("user", "pass").unwrap();
    client.quit().unwrap();

    let received = server.join().unwrap();
    assert_eq!(received[1], "AUTH LOGIN");
    assert_eq!(received[2], STANDARD.encode(b"user"));
    assert_eq!(received[3], STANDARD.encode(b"pass"));
}

#[test]
fn test_no_common_mechanism_is_rejected_locally() {
    let (port, server) = start_server(vec![
        Step::Send("220 mail.example.com ESMTP\r\n"),
        Step::Read,
        Step::Send("250-mail.example.com\r\n250 AUTH XOAUTH2\r\n"),
    ]);

    let client = Client::connect("127.0.0.1", port).unwrap();
    assert!(!client.server_info().supports_starttls());

    let err = client.auth("user", "pass").unwrap_err();
    assert!(matches!(err, Error::NotSupported(ref what) if what == "AUTH"));

    server.join().unwrap();
}

#[test]
fn test_starttls_requires_advertisement() {
    let (port, server) = start_server(vec![
        Step::Send("220 mail.example.com ESMTP\r\n"),
        Step::Read,
        Step::Send("250 mail.example.com\r\n"),
    ]);

    let client = Client::connect("127.0.0.1", port).unwrap();
    let err = client.starttls().unwrap_err();
    assert!(matches!(err, Error::NotSupported(ref what) if what == "STARTTLS"));

    server.join().unwrap();
}

#[test]
fn test_server_rejection_reports_code_and_text() {
    let (port, server) = start_server(vec![
        Step::Send("220 mail.example.com ESMTP\r\n"),
        Step::Read,
        Step::Send("250 mail.example.com\r\n"),
        Step::Read,
        Step::Send("550 5.1.0 sender rejected\r\n"),
    ]);

    let client = Client::connect("127.0.0.1", port).unwrap();
    let err = client.mail_from("spammer@example.com").unwrap_err();
    assert!(err.is_permanent());
    match err {
        Error::SmtpError { code, message } => {
            assert_eq!(code, 550);
            assert!(message.contains("sender rejected"));
        }
        other => panic!("unexpected error: {other}"),
    }

    server.join().unwrap();
}

#[test]
fn test_greeting_failure_is_an_error() {
    let (port, server) = start_server(vec![Step::Send("421 mail.example.com shutting down\r\n")]);

    let err = Client::connect("127.0.0.1", port).unwrap_err();
    match err {
        Error::SmtpError { code, .. } => assert_eq!(code, 421),
        other => panic!("unexpected error: {other}"),
    }

    server.join().unwrap();
}

#[test]
fn test_dropped_connection_is_reported() {
    let (port, server) = start_server(vec![
        Step::Send("220 mail.example.com ESMTP\r\n"),
        Step::Read,
    ]);

    // The server hangs up after EHLO instead of answering it.
    let err = Client::connect("127.0.0.1", port).unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));

    server.join().unwrap();
}
