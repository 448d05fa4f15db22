// src/logging.rs

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::path::PathBuf;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.as_str());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "certgraph-rs", env!("CARGO_PKG_NAME"))
}

/// Directory holding the log file; falls back to `./.data` when no home directory is known.
pub fn get_data_dir() -> PathBuf {
    match project_directory() {
        Some(proj_dirs) => proj_dirs.data_local_dir().to_path_buf(),
        None => PathBuf::from(".").join(".data"),
    }
}

/// Picks the filter directive: `RUST_LOG` wins over the project variable.
fn filter_directive(rust_log: Option<String>, project_level: Option<String>) -> String {
    let usable = |directive: &String| !directive.trim().is_empty();
    rust_log
        .filter(usable)
        .or_else(|| project_level.filter(usable))
        .unwrap_or_else(|| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Initializes logging using the tracing subscriber.
///
/// Events always go to a log file under the data directory. With `verbose`
/// they are mirrored to stderr as well; stdout is left to the projection output.
/// Returns the path of the log file.
pub fn initialize_logging(verbose: bool) -> Result<PathBuf> {
    let directory = get_data_dir();
    std::fs::create_dir_all(&directory)?;
    let log_path = directory.join(LOG_FILE.as_str());
    let log_file = std::fs::File::create(&log_path)?;

    let directive = filter_directive(std::env::var("RUST_LOG").ok(), std::env::var(LOG_ENV.as_str()).ok());

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(&directive));

    let stderr_subscriber = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(EnvFilter::new(&directive))
    });

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(stderr_subscriber)
        .with(ErrorLayer::default())
        .init();

    Ok(log_path)
}
