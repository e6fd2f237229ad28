use std::future::Future;
use std::str::FromStr;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::state::Config;

const LOG_FILE_NAME: &str = "secm.log";

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Initialize logging, panic handler, and build info reporting.
/// Returns guards that must be kept alive for the duration of the program.
///
/// Logs go to stderr so command output on stdout stays pipeable.
pub fn init_logging(config: &Config) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();
    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::WARN);

    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(stderr_guard);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_filter(env_filter(level));

    if let Some(log_dir) = &config.log_dir {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_filter(env_filter(level));

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(stderr_layer).init();
    }

    register_panic_logger();
    report_build_info();

    guards
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let build = common::prelude::build_info();

    tracing::debug!(
        version = build.package_version,
        repo_version = build.repo_version,
        build_profile = build.build_profile,
        "secm starting up"
    );
}

/// Resolves on SIGTERM, and never where that signal does not exist
///
/// The handler is installed when this is called, not when first polled.
fn terminated() -> impl Future<Output = ()> + Send + 'static {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let sigterm = signal(SignalKind::terminate());
        async move {
            match sigterm {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!("failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
    }
    #[cfg(not(unix))]
    std::future::pending::<()>()
}

/// Cancel `token` on Ctrl-C or SIGTERM
///
/// The task exits on its own once the token is cancelled elsewhere.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    let terminated = terminated();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    tracing::info!("interrupted, cancelling");
                    token.cancel();
                }
                Err(e) => {
                    tracing::warn!("failed to listen for Ctrl-C: {}", e);
                    token.cancelled().await;
                }
            },
            _ = terminated => {
                tracing::info!("terminated, cancelling");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_signal_task_exits_with_token() {
        let token = CancellationToken::new();
        let handle = cancel_on_signal(token.clone());
        token.cancel();
        handle.await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_cancels_token() {
        let token = CancellationToken::new();
        let handle = cancel_on_signal(token.clone());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }
}
