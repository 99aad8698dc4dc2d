use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Wall clock part of a timestamp, as shown in report banners
/// ```
/// # use chrono::{TimeZone, Utc};
/// # use smtp_sink::time::clock_time;
/// let at = Utc.with_ymd_and_hms(2021, 12, 1, 12, 1, 3).unwrap();
///
/// assert_eq!(clock_time(&at), "12:01:03");
/// ```
pub fn clock_time<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%H:%M:%S").to_string()
}

/// Date header value in the RFC 2822 shape mail clients expect
pub fn mail_date<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%a, %d %b %Y %H:%M:%S %z").to_string()
}
