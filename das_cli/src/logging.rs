//! Tracing setup: pretty output on stderr, optional JSON lines to a file.

use std::io;

use das_config::LoggingSection;
use eyre::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(cfg: &LoggingSection) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .wrap_err_with(|| format!("invalid log level {:?}", cfg.level))?;
    let stderr = fmt::layer().with_target(false).with_writer(io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(stderr);

    match &cfg.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .wrap_err_with(|| format!("opening log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            // keep the flush thread alive for the life of the process
            let _ = FILE_GUARD.set(guard);
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(writer))
                .init();
        }
        None => registry.init(),
    }
    Ok(())
}
