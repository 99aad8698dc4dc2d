//! The small command vocabulary understood outside the DATA phase.

/// A line received while not in the DATA phase.
///
/// Prefixes are matched case-insensitively and anything after them is kept
/// as the argument. Lines that match no prefix become
/// [`Command::Unrecognized`], which the session ignores without replying.
/// This also covers `STARTTLS`, `AUTH`, `RSET` and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO` or `EHLO`, with whatever client name followed it.
    Hello(String),
    /// `MAIL FROM:`, with the trimmed text after the colon.
    MailFrom(String),
    /// `RCPT TO:`, with the trimmed text after the colon.
    RcptTo(String),
    Data,
    Quit,
    Unrecognized(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        if let Some(rest) = strip_prefix_ignore_case(line, "HELO")
            .or_else(|| strip_prefix_ignore_case(line, "EHLO"))
        {
            Command::Hello(rest.trim().to_owned())
        } else if let Some(rest) = strip_prefix_ignore_case(line, "MAIL FROM:") {
            Command::MailFrom(rest.trim().to_owned())
        } else if let Some(rest) = strip_prefix_ignore_case(line, "RCPT TO:") {
            Command::RcptTo(rest.trim().to_owned())
        } else if strip_prefix_ignore_case(line, "DATA").is_some() {
            Command::Data
        } else if strip_prefix_ignore_case(line, "QUIT").is_some() {
            Command::Quit
        } else {
            Command::Unrecognized(line.to_owned())
        }
    }

    /// Short verb for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Hello(_) => "HELO",
            Command::MailFrom(_) => "MAIL",
            Command::RcptTo(_) => "RCPT",
            Command::Data => "DATA",
            Command::Quit => "QUIT",
            Command::Unrecognized(_) => "?",
        }
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vocabulary_case_insensitively() {
        assert_eq!(
            Command::parse("ehlo client.example"),
            Command::Hello("client.example".into())
        );
        assert_eq!(Command::parse("HELO"), Command::Hello(String::new()));
        assert_eq!(
            Command::parse("mail from: <demo@leadscaper.local>"),
            Command::MailFrom("<demo@leadscaper.local>".into())
        );
        assert_eq!(
            Command::parse("RCPT TO:<owner@acme.test>"),
            Command::RcptTo("<owner@acme.test>".into())
        );
        assert_eq!(Command::parse("data"), Command::Data);
        assert_eq!(Command::parse("Quit"), Command::Quit);
    }

    #[test]
    fn extension_commands_are_unrecognized() {
        for line in ["STARTTLS", "AUTH PLAIN AGlk", "RSET", "NOOP", "MAIL <x>", ""] {
            assert_eq!(
                Command::parse(line),
                Command::Unrecognized(line.to_owned()),
                "{line}"
            );
        }
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        assert_eq!(
            Command::parse("é"),
            Command::Unrecognized("é".to_owned())
        );
        assert_eq!(
            Command::parse("ééééé"),
            Command::Unrecognized("ééééé".to_owned())
        );
    }
}
