use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber and routes `log` records into it.
///
/// The level comes from `RUST_LOG`, falling back to `info`. Build with the
/// `tracing_json` feature for JSON lines, `tracing_noansi` to drop colours.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!cfg!(feature = "tracing_noansi"));

    let installed = if cfg!(feature = "tracing_json") {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = installed {
        eprintln!("Couldn't install tracing subscriber: {}", e);
        return;
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::warn!("Couldn't forward log records: {}", e);
    }
}
