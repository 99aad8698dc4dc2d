//! # Completed message reporting
//!
//! One [`Report`] is produced per message that reached its payload
//! terminator. Where it goes is up to the [`Reporter`] the server was
//! started with.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tracing::{error, info};

use crate::smtp::{Envelope, ParsedMessage};
use crate::time::clock_time;

/// Placeholder for envelope fields or a subject that never showed up.
pub const UNKNOWN: &str = "unknown";

const RULE_WIDTH: usize = 80;

/// Output record for one completed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub completed_at: DateTime<Local>,
}

impl Report {
    pub fn new(envelope: &Envelope, message: &ParsedMessage) -> Self {
        Self::at(envelope, message, Local::now())
    }

    pub fn at(
        envelope: &Envelope,
        message: &ParsedMessage,
        completed_at: DateTime<Local>,
    ) -> Self {
        let or_unknown =
            |value: &Option<String>| value.clone().unwrap_or_else(|| UNKNOWN.to_owned());

        Report {
            sender: or_unknown(&envelope.sender),
            recipient: or_unknown(&envelope.recipient),
            subject: or_unknown(&message.subject),
            business_name: message.business_name.clone(),
            completed_at,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        writeln!(f, "{}", heavy)?;
        writeln!(f, "EMAIL RECEIVED - {}", clock_time(&self.completed_at))?;
        writeln!(f, "{}", heavy)?;
        writeln!(f, "From: {}", self.sender)?;
        writeln!(f, "To: {}", self.recipient)?;
        writeln!(f, "{}", "-".repeat(RULE_WIDTH))?;
        if self.subject == UNKNOWN {
            writeln!(f, "Subject: {}", UNKNOWN)?;
        } else {
            writeln!(f, "{}", self.subject.trim())?;
        }
        if let Some(business) = &self.business_name {
            writeln!(f, "Business: {}", business)?;
        }
        write!(f, "{}", heavy)
    }
}

/// Receives every completed message. Called from the connection's own
/// task, once per message.
pub trait Reporter: Send + Sync {
    fn report(&self, envelope: &Envelope, message: &ParsedMessage);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(ReportFormat::Pretty),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format {:?}", other)),
        }
    }
}

/// Prints reports on stdout and logs a summary event.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    format: ReportFormat,
}

impl ConsoleReporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, report: &Report) -> Result<String, serde_json::Error> {
        match self.format {
            ReportFormat::Pretty => Ok(report.to_string()),
            ReportFormat::Json => serde_json::to_string(report),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, envelope: &Envelope, message: &ParsedMessage) {
        let report = Report::new(envelope, message);
        info!(
            sender = %report.sender,
            recipient = %report.recipient,
            subject = %report.subject,
            business = report.business_name.as_deref().unwrap_or(""),
            lines = message.raw_body.len(),
            "Email logged"
        );
        match self.render(&report) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => error!("Couldn't render report: {}", e),
        }
    }
}

/// Keeps every delivery in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    deliveries: Mutex<Vec<(Envelope, ParsedMessage)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<(Envelope, ParsedMessage)> {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, envelope: &Envelope, message: &ParsedMessage) {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((envelope.clone(), message.clone()));
    }
}
