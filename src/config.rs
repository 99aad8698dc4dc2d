//! Runtime settings, read from the environment after loading `.env`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::report::ReportFormat;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1025;
pub const DEFAULT_SERVICE_NAME: &str = "SMTP";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Second word of the `220` greeting.
    pub service_name: String,
    /// Longest the accept loop waits before looking at the shutdown flag.
    pub poll_interval: Duration,
    /// Concurrent sessions allowed, `None` for no limit.
    pub max_connections: Option<usize>,
    /// How long a read may wait for the peer, `None` to wait forever.
    pub idle_timeout: Option<Duration>,
    /// Longest line accepted, `None` for no limit.
    pub max_line_length: Option<usize>,
    pub report_format: ReportFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_connections: None,
            idle_timeout: None,
            max_line_length: None,
            report_format: ReportFormat::default(),
        }
    }
}

impl Config {
    /// Loads `.env` if there is one, then reads `SINK_*` variables.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Ok(Config {
            host: lookup("SINK_HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "SINK_PORT")?.unwrap_or(defaults.port),
            service_name: lookup("SINK_SERVICE_NAME").unwrap_or(defaults.service_name),
            poll_interval: parsed(&lookup, "SINK_POLL_INTERVAL_MS")?
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_connections: parsed(&lookup, "SINK_MAX_CONNECTIONS")?.filter(|n| *n > 0),
            idle_timeout: parsed(&lookup, "SINK_IDLE_TIMEOUT_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            max_line_length: parsed(&lookup, "SINK_MAX_LINE_LENGTH")?.filter(|n| *n > 0),
            report_format: parsed(&lookup, "SINK_REPORT_FORMAT")?
                .unwrap_or(defaults.report_format),
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig { key, value }),
    }
}
