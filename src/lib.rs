//! # smtp-sink
//!
//! A minimal mail acceptance server for local testing of outbound email.
//! It takes one message per connection, pulls out the subject line and the
//! business name the message was personalised with, and reports it.
//!
//! This is a debugging sink, not a mail server: nothing is stored or relayed.

pub mod client;
pub mod config;
pub mod error;
pub mod report;
pub mod smtp;
pub mod time;
pub mod tracing;

pub use config::Config;
pub use error::Error;
