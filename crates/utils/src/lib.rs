pub mod sentry;
pub mod shell;
