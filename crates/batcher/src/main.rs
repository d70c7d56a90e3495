use metric_batcher::HttpSender;
use metric_batcher::config::Config;
use metric_batcher::relay::Relay;
use tracing::error;

/// Exceptional startup failure: log and exit.
fn fatal(msg: &str, error: &dyn std::fmt::Display) -> ! {
    error!(%error, "{msg}");
    std::process::exit(1);
}

fn setup_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = std::env::var("METRIC_BATCHER_LOG_LEVEL")
        .ok()
        .and_then(|val| {
            val.parse::<LevelFilter>().ok().or_else(|| {
                eprintln!("invalid METRIC_BATCHER_LOG_LEVEL: {val:?}, defaulting to WARN");
                None
            })
        })
        .unwrap_or(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_microjson::JsonLayer::new(std::io::stderr).with_target(true))
        .init();
}

fn setup_rustls() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() {
    setup_logging();
    setup_rustls();

    let config = Config::from_env().unwrap_or_else(|e| fatal("config error", &e));

    let sender =
        HttpSender::new(&config).unwrap_or_else(|e| fatal("failed to build HTTP client", &e));

    let mut relay = Relay::new(sender, &config)
        .await
        .unwrap_or_else(|e| fatal("failed to start relay", &e));

    if let Err(e) = relay.run(shutdown_signal()).await {
        error!(%e, "runtime error");
        std::process::exit(1);
    }
}
