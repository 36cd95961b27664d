use sentry_tracing::{EventFilter, SentryLayer};
use tracing::Level;
use tracing_subscriber::registry::LookupSpan;

/// Initialise error reporting for a binary. Returns `None` when no DSN is
/// configured, in which case the sentry layer stays inert.
pub fn init_once(dsn: Option<&str>, source: &'static str) -> Option<sentry::ClientInitGuard> {
    let dsn = dsn?;
    let environment = if cfg!(debug_assertions) {
        "dev"
    } else {
        "production"
    };
    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(environment.into()),
            ..Default::default()
        },
    ));
    sentry::configure_scope(|scope| {
        scope.set_tag("source", source);
    });
    Some(guard)
}

/// Errors become sentry events, warnings become breadcrumbs.
pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    sentry_tracing::layer()
        .span_filter(|meta| {
            matches!(
                *meta.level(),
                Level::DEBUG | Level::INFO | Level::WARN | Level::ERROR
            )
        })
        .event_filter(|meta| match *meta.level() {
            Level::ERROR => EventFilter::Event,
            Level::WARN => EventFilter::Breadcrumb,
            _ => EventFilter::Ignore,
        })
}
