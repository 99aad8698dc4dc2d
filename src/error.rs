use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("port {port} is already in use on {host}")]
    AddrInUse { host: String, port: u16 },
    #[error("couldn't listen on {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("couldn't resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("no address found for {0}")]
    NoAddress(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
    #[error("line longer than {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("nothing received for {0:?}")]
    IdleTimeout(Duration),
    #[error("expected a {expected} reply, got {got:?}")]
    UnexpectedReply { expected: u16, got: String },
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Startup errors stop the server, everything else only ends one
    /// connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AddrInUse { .. }
                | Error::Bind { .. }
                | Error::Resolve { .. }
                | Error::NoAddress(_)
                | Error::InvalidConfig { .. }
        )
    }
}
