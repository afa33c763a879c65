use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};

/// Starts Sentry when a DSN is configured. Keep the guard alive for the life of the process.
pub fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    config.sentry_dsn.clone().map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            traces_sample_rate: 0.0,
            send_default_pii: false,
            ..Default::default()
        })
    })
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`), text or JSON output,
/// and the Sentry layer so errors logged through `tracing` are reported.
pub fn init_tracing(format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (json, text) = match format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Text => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .with(sentry_tracing::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn sentry_stays_off_without_dsn() {
        assert!(init_sentry(&test_config()).is_none());
    }
}
