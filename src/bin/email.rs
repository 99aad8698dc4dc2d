//! Sends one outreach email to the sink configured through `SINK_HOST` and
//! `SINK_PORT`.
//!
//! ```text
//! email <to> <subject> [business]
//! ```

use std::env;
use std::process::ExitCode;

use smtp_sink::client::{outreach_html, OutgoingMessage, SubmissionClient};
use smtp_sink::tracing::setup_tracing;
use smtp_sink::Config;
use tracing::error;

const DEFAULT_FROM: &str = "demo@leadscaper.local";

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let (to, subject) = match (args.first(), args.get(1)) {
        (Some(to), Some(subject)) => (to.as_str(), subject.as_str()),
        _ => {
            eprintln!("usage: email <to> <subject> [business]");
            return ExitCode::FAILURE;
        }
    };
    let business = args.get(2).map(String::as_str).unwrap_or("your business");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let from = env::var("FROM_EMAIL").unwrap_or_else(|_| DEFAULT_FROM.to_owned());

    let client = SubmissionClient::new(config.host, config.port);
    let message = OutgoingMessage::new(subject, outreach_html(business));
    match client.send(&from, to, &message).await {
        Ok(receipt) => {
            match serde_json::to_string(&receipt) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Couldn't render receipt: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sending to {} failed: {}", to, e);
            ExitCode::FAILURE
        }
    }
}
