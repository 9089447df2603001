//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the robot lifecycle runtime."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::io;

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "ROBOFLEET_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

static GUARDS: OnceCell<[WorkerGuard; 2]> = OnceCell::new();

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Available log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Install the process-wide subscriber.
///
/// Console output goes to stderr because stdout carries command results. The file
/// `<directory>/<prefix>.log.<date>` always receives JSON; `prefix` defaults to the
/// service name. The filter comes from `ROBOFLEET_LOG`, then `RUST_LOG`, then `info`.
/// Only the first call installs anything.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, format!("{prefix}.log")));
    let (console_writer, console_guard) = tracing_appender::non_blocking(io::stderr());

    let (filter, rejected) = select_filter(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(config.format, console_writer))
        .with(file_layer(file_writer))
        .try_init()
        .is_ok();
    if !installed {
        return Ok(());
    }
    let _ = GUARDS.set([file_guard, console_guard]);

    if let Some((source, directive)) = rejected {
        warn!(source, directive = %directive, "ignoring invalid log filter");
    }
    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

/// First valid directive wins. An invalid one is skipped and reported back with its source.
fn select_filter(
    robofleet_log: Option<String>,
    rust_log: Option<String>,
) -> (EnvFilter, Option<(&'static str, String)>) {
    let mut rejected = None;
    for (source, directive) in [(LOG_ENV, robofleet_log), (EnvFilter::DEFAULT_ENV, rust_log)] {
        let Some(directive) = directive else { continue };
        match EnvFilter::try_new(&directive) {
            Ok(filter) => return (filter, rejected),
            Err(_) if rejected.is_none() => rejected = Some((source, directive)),
            Err(_) => {}
        }
    }
    (EnvFilter::new(DEFAULT_DIRECTIVE), rejected)
}

fn console_layer<S>(format: LogFormat, writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.with_target(true).boxed(),
    }
}

fn file_layer<S>(writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(writer)
        .boxed()
}
