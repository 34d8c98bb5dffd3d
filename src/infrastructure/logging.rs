use std::io::{self, IsTerminal};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{config::AppConfig, infrastructure::directories::ResolvedPaths};

const LOG_FILE_PREFIX: &str = "feed-guard.log";
const FALLBACK_LEVEL: &str = "info";
// HTTP plumbing logs every connection at debug, which drowns the scanner.
const QUIET_DEPENDENCIES: [&str; 3] = ["hyper=warn", "reqwest=warn", "tokio_cron_scheduler=warn"];

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Console output goes to stderr: stdout carries the host's effect stream.
pub fn init_tracing(config: &AppConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let env_filter = build_env_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
            &config.logging.level,
        );

        let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_ansi(io::stderr().is_terminal());

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(
            logs = %paths.logs_dir.display(),
            level = %config.logging.level,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level; an unparseable directive falls
/// through to the next source and finally to `info`.
fn build_env_filter(env_directives: Option<&str>, level: &str) -> EnvFilter {
    if let Some(filter) = env_directives.and_then(|raw| EnvFilter::try_new(raw).ok()) {
        return filter;
    }
    let base = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL));
    QUIET_DEPENDENCIES
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(base, EnvFilter::add_directive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(filter: &EnvFilter) -> Vec<String> {
        let mut parts: Vec<String> = filter.to_string().split(',').map(str::to_string).collect();
        parts.sort();
        parts
    }

    #[test]
    fn unparseable_level_falls_back_to_info() {
        let filter = build_env_filter(None, "scanner=loud");
        let parts = directives(&filter);
        assert!(parts.contains(&"info".to_string()));
        assert!(parts.contains(&"hyper=warn".to_string()));
    }

    #[test]
    fn environment_directives_take_precedence() {
        let filter = build_env_filter(Some("scanner=trace"), "debug");
        assert_eq!(directives(&filter), vec!["scanner=trace".to_string()]);

        let filter = build_env_filter(Some("scanner=loud"), "debug");
        assert!(directives(&filter).contains(&"debug".to_string()));
    }
}
