use std::process::ExitCode;
use std::sync::Arc;

use smtp_sink::report::ConsoleReporter;
use smtp_sink::smtp::Listener;
use smtp_sink::tracing::setup_tracing;
use smtp_sink::Config;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let reporter = Arc::new(ConsoleReporter::new(config.report_format));
    let listener = match Listener::bind(&config, reporter).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = listener.shutdown_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            shutdown.trigger();
        }
    });

    match listener.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("SMTP service exited: {}", e);
            ExitCode::FAILURE
        }
    }
}
