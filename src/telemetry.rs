//! Tracing subscriber setup for binaries and tests embedding the simulation.

use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// A subscriber printing to stdout, filtered by `RUST_LOG` or `default_filter` when unset.
pub fn get_subscriber(default_filter: &str) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    Registry::default()
        .with(env_filter)
        .with(fmt::Layer::new().without_time())
}

/// Install `subscriber` as the global default. Fails if one is already installed.
pub fn init_subscriber(
    subscriber: impl Subscriber + Send + Sync,
) -> Result<(), SetGlobalDefaultError> {
    set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_subscriber_sees_events() {
        let subscriber = get_subscriber("debug");
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("inside scoped subscriber");
        });
    }
}
