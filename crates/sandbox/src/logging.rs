use std::backtrace::Backtrace;

use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config;

/// Logs to stdout and to a daily log file. `RUST_LOG` overrides the default
/// `info` level.
///
/// Buffered file output is lost unless the returned guard is kept alive until
/// the process exits.
pub fn init() -> anyhow::Result<WorkerGuard> {
    let file_appender =
        tracing_appender::rolling::daily(config::LOG_DIRECTORY, config::LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stdout))
        .try_init()?;

    Ok(guard)
}

/// Routes panics, with a backtrace, through the log before the default hook
/// prints them.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::force_capture();
        error!("{info}\n{backtrace}");
        default_hook(info);
    }));
}
