//! Per-run logging context.
//!
//! The subscriber is installed as the thread's scoped default and removed
//! when the returned guard drops; nothing is registered process-wide.
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

pub struct Observability {
    _guard: DefaultGuard,
}

impl Observability {
    /// Install logging for this run. `RUST_LOG` overrides `level`.
    pub fn install(config: &LoggingConfig, verbose: bool) -> Result<Self> {
        let level = if verbose {
            "debug".to_string()
        } else {
            config.level.to_ascii_lowercase()
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
        let writer = match &config.file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("open log file {}", path.display()))?;
                BoxMakeWriter::new(Mutex::new(file))
            }
            None => BoxMakeWriter::new(std::io::stderr),
        };
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(config.file.is_none())
            .with_target(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        tracing::debug!(level = %level, "logging initialized");
        Ok(Self { _guard: guard })
    }
}
