//! # SMTP sink module
//!
//! A small acceptance server built straight on top of tokio's TcpStream,
//! using a state machine made of enums and matching. One message per
//! connection, no TLS, no AUTH, and anything it doesn't understand before
//! DATA is quietly ignored.

pub mod app;
pub mod command;
pub mod line_buffer;
pub mod parse;
pub mod state_machine;

pub use app::{handle_connection, serve_smtp, Context, Listener, Shutdown};
pub use command::Command;
pub use line_buffer::{LineBuffer, RawLine};
pub use parse::{MessageParser, ParsedMessage};
pub use state_machine::{Action, Envelope, Reply, Session, State};
