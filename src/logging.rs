use std::{path::PathBuf, sync::Once};

use tracing::Level;
use tracing::{debug, info, metadata::LevelFilter};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{prelude::*, EnvFilter};

fn do_init(stdout_level: Level, file_level: Option<(Level, PathBuf)>) -> bool {
    let mut message = String::from("Logging with: stdout");

    // RUST_LOG wins over the given level, if set.
    let stdout_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from(stdout_level).into()));

    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(stdout_filter);

    let registry = tracing_subscriber::registry().with(stdout_layer);

    let maybe_file_layer = if let Some((level, output_dir)) = file_level {
        message += &format!(", file (in dir {output_dir:?})");

        let file_appender = RollingFileAppender::new(Rotation::DAILY, output_dir, "serial-adapter.log");

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_filter(LevelFilter::from(level));
        Some(file_layer)
    } else {
        None
    };

    if let Err(e) = registry.with(maybe_file_layer).try_init() {
        eprintln!("Could not install the tracing subscriber: {e}");
        return false;
    }

    debug!(message);
    true
}

/// Install the global tracing subscriber.
///
/// Only the first call has an effect, later ones return false.
/// Tests may therefore call this freely.
pub fn init(stdout_level: Level, file_logging: Option<(Level, PathBuf)>) -> bool {
    static INIT: Once = Once::new();

    let mut installed = false;
    INIT.call_once(|| installed = do_init(stdout_level, file_logging));

    if installed {
        info!("Logging initialized");
    }

    installed
}
