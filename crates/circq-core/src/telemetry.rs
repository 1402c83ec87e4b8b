use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{CircqError, Result};

/// Build the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.trim())
        .map_err(|e| CircqError::InvalidSetting(format!("logging.level {:?}: {}", config.level, e)))
}

/// Install the global subscriber. Logs go to stderr so that stdout stays
/// free for reports. A second call is a no-op.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = installed {
        tracing::debug!("tracing subscriber already installed: {}", e);
    }
    Ok(())
}
