//! # Submission client
//!
//! The sending side of the sink: opens one connection per message and walks
//! the fixed HELO, MAIL, RCPT, DATA, QUIT sequence. Payload lines are sent
//! as they are, without dot-stuffing, so a body line made of a single `.`
//! ends the message early.

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Error;
use crate::time::mail_date;

/// Outcome of one submission, mirrored from what the sending service
/// records per recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub status: &'static str,
    pub to: String,
    pub subject: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct SubmissionClient {
    host: String,
    port: u16,
    helo_name: String,
}

impl SubmissionClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            helo_name: "localhost".to_owned(),
        }
    }

    pub fn with_helo_name(mut self, name: impl Into<String>) -> Self {
        self.helo_name = name.into();
        self
    }

    /// Sends `message` from `from` to `to` over a fresh connection.
    pub async fn send(
        &self,
        from: &str,
        to: &str,
        message: &OutgoingMessage,
    ) -> Result<Receipt, Error> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut replies = BufReader::new(read_half);

        expect_reply(&mut replies, 220).await?;
        command(&mut write_half, &mut replies, &format!("HELO {}", self.helo_name), 250).await?;
        command(&mut write_half, &mut replies, &format!("MAIL FROM:<{}>", from), 250).await?;
        command(&mut write_half, &mut replies, &format!("RCPT TO:<{}>", to), 250).await?;
        command(&mut write_half, &mut replies, "DATA", 354).await?;

        let mut payload = String::new();
        for line in message.lines(from, to) {
            payload.push_str(&line);
            payload.push_str("\r\n");
        }
        write_half.write_all(payload.as_bytes()).await?;
        command(&mut write_half, &mut replies, ".", 250).await?;
        command(&mut write_half, &mut replies, "QUIT", 221).await?;

        Ok(Receipt {
            status: "sent",
            to: to.to_owned(),
            subject: message.subject.clone(),
            timestamp: Local::now(),
        })
    }
}

/// A single-part HTML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub subject: String,
    pub html_body: String,
}

impl OutgoingMessage {
    pub fn new(subject: impl Into<String>, html_body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            html_body: html_body.into(),
        }
    }

    /// Headers and body as protocol lines, without terminators.
    pub fn lines(&self, from: &str, to: &str) -> Vec<String> {
        let mut lines = vec![
            format!("Subject: {}", self.subject),
            format!("From: {}", from),
            format!("To: {}", to),
            format!("Date: {}", mail_date(&Local::now())),
            "MIME-Version: 1.0".to_owned(),
            "Content-Type: text/html; charset=utf-8".to_owned(),
            String::new(),
        ];
        lines.extend(self.html_body.lines().map(str::to_owned));
        lines
    }
}

/// Outreach body naming `business` inside `<strong>` tags.
pub fn outreach_html(business: &str) -> String {
    format!(
        "<html>\n<body>\n<p>Hi there,</p>\n\
         <p>I came across <strong>{}</strong> and wanted to reach out.</p>\n\
         <p>Best regards</p>\n</body>\n</html>",
        business
    )
}

async fn command<W, R>(
    writer: &mut W,
    replies: &mut R,
    line: &str,
    expected: u16,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    debug!("C: {}", line);
    writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
    writer.flush().await?;
    expect_reply(replies, expected).await
}

async fn expect_reply<R>(replies: &mut R, expected: u16) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut reply = String::new();
    if replies.read_line(&mut reply).await? == 0 {
        return Err(Error::ConnectionClosed);
    }
    let reply = reply.trim_end();
    debug!("S: {}", reply);
    if reply.get(..3) == Some(expected.to_string().as_str()) {
        Ok(())
    } else {
        Err(Error::UnexpectedReply {
            expected,
            got: reply.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn message_lines_start_with_headers() {
        let message = OutgoingMessage::new("Quick question", outreach_html("Acme Co"));
        let lines = message.lines("demo@leadscaper.local", "owner@acme.test");
        assert_eq!(lines[0], "Subject: Quick question");
        assert_eq!(lines[1], "From: demo@leadscaper.local");
        assert_eq!(lines[2], "To: owner@acme.test");
        assert!(lines[3].starts_with("Date: "));
        assert_eq!(lines[6], "");
        assert!(lines.iter().any(|l| l.contains("<strong>Acme Co</strong>")));
    }

    #[tokio::test]
    async fn expect_reply_checks_code() {
        let (mut server, client) = duplex(256);
        server.write_all(b"250 OK\r\n221 Bye\r\n").await.unwrap();
        drop(server);
        let mut replies = BufReader::new(client);

        assert!(expect_reply(&mut replies, 250).await.is_ok());
        match expect_reply(&mut replies, 250).await {
            Err(Error::UnexpectedReply { expected, got }) => {
                assert_eq!(expected, 250);
                assert_eq!(got, "221 Bye");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            expect_reply(&mut replies, 250).await,
            Err(Error::ConnectionClosed)
        ));
    }
}
