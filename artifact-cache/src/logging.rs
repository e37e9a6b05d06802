use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the configured level. Returns false when a subscriber
/// was already installed, which lets hosts and tests call this freely.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init().is_ok(),
        "pretty" => builder.pretty().try_init().is_ok(),
        _ => builder.try_init().is_ok(),
    };

    if installed {
        tracing::debug!(
            "Logging initialized (level={}, format={})",
            config.level,
            config.format
        );
    }
    installed
}
