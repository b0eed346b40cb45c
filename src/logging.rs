use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::domain::DMError;

/// Where log lines go. The TUI owns the terminal, so it logs to a file or nowhere.
pub enum LogTarget<'a> {
    File(&'a Path),
    Stderr,
    Discard,
}

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the verbosity flag.
pub fn init(target: LogTarget<'_>, verbosity: u8) -> Result<(), DMError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dmi={}", level_for(verbosity))));

    let fmt_layer = match target {
        LogTarget::File(path) => {
            let file = File::create(path)?;
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed()
        }
        LogTarget::Stderr => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogTarget::Discard => fmt::layer().with_writer(std::io::sink).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| DMError::LoadingFailed(format!("cannot install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(9), "trace");
    }
}
