//! Per-connection protocol state, kept free of any IO so it can be driven
//! line by line from the socket loop in [`crate::smtp::app`] or from tests.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::error::Error;
use crate::smtp::command::Command;
use crate::smtp::line_buffer::{LineBuffer, RawLine};

/// Line that ends the DATA phase.
pub const PAYLOAD_TERMINATOR: &str = ".";

/// Session states. The derived ordering is the order a well behaved client
/// walks through them, and transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Greeting,
    Ready,
    MailSet,
    RcptSet,
    DataMode,
    Complete,
    Closed,
}

impl State {
    /// Where `command` would take a session sitting in this state, or
    /// `None` when it should be ignored.
    pub fn next(self, command: &Command) -> Option<State> {
        let target = match command {
            Command::Quit => return Some(State::Closed),
            Command::Unrecognized(_) => return None,
            Command::Hello(_) => State::Ready,
            Command::MailFrom(_) => State::MailSet,
            Command::RcptTo(_) => State::RcptSet,
            Command::Data => State::DataMode,
        };
        (target > self && self < State::DataMode).then_some(target)
    }
}

/// Fixed replies written back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Hello,
    Ok,
    StartData,
    Bye,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reply::Hello => "250 Hello",
            Reply::Ok => "250 OK",
            Reply::StartData => "354 Send message, end with CRLF.CRLF",
            Reply::Bye => "221 Bye",
        })
    }
}

/// Sender and recipient declared before the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub sender: Option<String>,
    pub recipient: Option<String>,
}

/// What the connection driver has to do after a line was handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Nothing to write, read the next line.
    Ignore,
    Reply(Reply),
    /// The payload terminator arrived. Hand the payload on, then reply
    /// [`Reply::Ok`].
    Deliver(Vec<String>),
    /// Write [`Reply::Bye`] and drop the connection.
    Close,
}

#[derive(Debug)]
pub struct Session {
    state: State,
    envelope: Envelope,
    payload: Vec<String>,
    buffer: LineBuffer,
    max_line_length: Option<usize>,
    created_at: DateTime<Local>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Session {
    pub fn new(max_line_length: Option<usize>) -> Self {
        Self {
            state: State::Greeting,
            envelope: Envelope::default(),
            payload: Vec::new(),
            buffer: LineBuffer::new(),
            max_line_length,
            created_at: Local::now(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn payload(&self) -> &[String] {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// Buffers a chunk read from the peer and returns the lines it
    /// completed. Fails once a line outgrows the configured limit.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<RawLine>, Error> {
        let lines = self.buffer.feed(chunk);
        if let Some(limit) = self.max_line_length {
            let longest = lines.iter().map(Vec::len).max().unwrap_or(0);
            if longest > limit || self.buffer.residue().len() > limit {
                return Err(Error::LineTooLong { limit });
            }
        }
        Ok(lines)
    }

    /// Marks the session as finished after a disconnect or IO failure.
    /// Any payload gathered so far is dropped.
    pub fn close(&mut self) {
        self.payload.clear();
        self.state = State::Closed;
    }

    pub fn handle_line(&mut self, line: &[u8]) -> Action {
        let line = String::from_utf8_lossy(line);
        match self.state {
            State::Closed => Action::Ignore,
            State::DataMode => self.handle_data_line(&line),
            _ => self.handle_command(Command::parse(&line)),
        }
    }

    fn handle_data_line(&mut self, line: &str) -> Action {
        if line == PAYLOAD_TERMINATOR {
            self.state = State::Complete;
            debug!(lines = self.payload.len(), "payload complete");
            Action::Deliver(std::mem::take(&mut self.payload))
        } else {
            self.payload.push(line.to_owned());
            Action::Ignore
        }
    }

    fn handle_command(&mut self, command: Command) -> Action {
        let Some(next) = self.state.next(&command) else {
            debug!(state = ?self.state, verb = command.verb(), "ignoring line");
            return Action::Ignore;
        };
        debug!(from = ?self.state, to = ?next, verb = command.verb(), "transition");
        self.state = next;

        match command {
            Command::Hello(_) => Action::Reply(Reply::Hello),
            Command::MailFrom(sender) => {
                self.envelope.sender = Some(sender);
                Action::Reply(Reply::Ok)
            }
            Command::RcptTo(recipient) => {
                self.envelope.recipient = Some(recipient);
                Action::Reply(Reply::Ok)
            }
            Command::Data => Action::Reply(Reply::StartData),
            Command::Quit => {
                self.close();
                Action::Close
            }
            Command::Unrecognized(_) => Action::Ignore,
        }
    }
}
