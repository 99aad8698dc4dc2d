//! # Message scanning
//!
//! Best-effort textual scan of a received payload. Nothing here understands
//! MIME, it only looks for a subject header line and a business name
//! wrapped in `<strong>` tags, which is what outreach emails carry.

use regex::Regex;
use serde::Serialize;

const SUBJECT_PATTERN: &str = r"(?i)^subject:";
const BUSINESS_PATTERN: &str = r"<strong>(.*?)</strong>";

/// What was found in a completed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    /// The first `Subject:` line, kept whole.
    pub subject: Option<String>,
    /// Text between the first `<strong>` and the next `</strong>` on the
    /// first line holding both.
    pub business_name: Option<String>,
    pub raw_body: Vec<String>,
}

impl ParsedMessage {
    /// Payload lines joined back with CRLF.
    pub fn body(&self) -> String {
        self.raw_body.join("\r\n")
    }
}

#[derive(Debug, Clone)]
pub struct MessageParser {
    subject: Regex,
    business: Regex,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageParser {
    pub fn new() -> Self {
        // Both patterns are constants, compilation cannot fail.
        Self {
            subject: Regex::new(SUBJECT_PATTERN).expect("valid subject pattern"),
            business: Regex::new(BUSINESS_PATTERN).expect("valid business pattern"),
        }
    }

    pub fn parse(&self, raw_body: Vec<String>) -> ParsedMessage {
        let subject = raw_body
            .iter()
            .find(|line| self.subject.is_match(line))
            .cloned();

        let business_name = raw_body
            .iter()
            .find_map(|line| self.business.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned());

        ParsedMessage {
            subject,
            business_name,
            raw_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn finds_subject_line() {
        let parsed = MessageParser::new().parse(lines(&[
            "From: demo@leadscaper.local",
            "Subject: Test Run",
            "",
            "Subject: not this one",
        ]));
        assert_eq!(parsed.subject.as_deref(), Some("Subject: Test Run"));
    }

    #[test]
    fn subject_match_ignores_case_but_keeps_line() {
        let parsed = MessageParser::new().parse(lines(&["SUBJECT: loud"]));
        assert_eq!(parsed.subject.as_deref(), Some("SUBJECT: loud"));
    }

    #[test]
    fn subject_needs_the_colon_at_line_start() {
        let parsed = MessageParser::new().parse(lines(&[
            "Subject line is missing",
            "X-Subject: nope",
            "Re Subject: nope",
        ]));
        assert_eq!(parsed.subject, None);
    }

    #[test]
    fn extracts_business_name() {
        let parsed = MessageParser::new().parse(lines(&[
            "<p>Hi there,</p>",
            "<p>We noticed <strong>Acme Co</strong> is growing.</p>",
            "<p><strong>Other</strong></p>",
        ]));
        assert_eq!(parsed.business_name.as_deref(), Some("Acme Co"));
    }

    #[test]
    fn business_name_needs_both_markers_on_one_line() {
        let parsed = MessageParser::new().parse(lines(&[
            "<strong>Acme",
            "Co</strong>",
            "</strong>backwards<strong>",
        ]));
        assert_eq!(parsed.business_name, None);
    }

    #[test]
    fn empty_payload() {
        let parsed = MessageParser::new().parse(Vec::new());
        assert_eq!(
            parsed,
            ParsedMessage {
                subject: None,
                business_name: None,
                raw_body: Vec::new(),
            }
        );
        assert_eq!(parsed.body(), "");
    }
}
