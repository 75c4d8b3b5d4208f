//! Logger and logging macros
//!
//! The macros forward to the `log` facade so that crates only need `blockwise_core` and `log`
//! as dependencies, while [`init_logger`] installs the log4rs backend once per process.

pub use log::{Level, LevelFilter};

mod appender;
mod consts;
mod logger;

pub use consts::{DEFAULT_LOGGER_ENV, ERR_LOG_FILE_NAME, LOG_FILE_NAME};
pub use logger::LogError;

use appender::AppenderSpec;
use log4rs::{Config, config::Root};
use std::iter;

const CONSOLE_APPENDER: &str = "stdout";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Installs the process-wide logger.
///
/// Console output is always enabled. When `log_dir` is provided, a rolling log file and a
/// warnings-and-above file are written there. `filters` follows the `RUST_LOG` syntax
/// (`info,blockwise_pipeline=debug`) and is applied on top of the environment variable.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<(), LogError> {
    let mut stdout_appender = AppenderSpec::console(CONSOLE_APPENDER, None);
    let mut file_appender = log_dir.map(|dir| AppenderSpec::roller(LOG_FILE_APPENDER, None, dir, LOG_FILE_NAME)).transpose()?;
    let mut err_file_appender =
        log_dir.map(|dir| AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(LevelFilter::Warn), dir, ERR_LOG_FILE_NAME)).transpose()?;
    let appenders = iter::once(stdout_appender.name)
        .chain(file_appender.as_ref().map(|x| x.name))
        .chain(err_file_appender.as_ref().map(|x| x.name))
        .collect::<Vec<_>>();

    let loggers = logger::Builder::new()
        .root_level(LevelFilter::Info)
        .parse_env(DEFAULT_LOGGER_ENV)
        .parse_expression(filters)
        .build();

    let mut config = Config::builder().appender(stdout_appender.appender()?);
    if let Some(file_appender) = file_appender.as_mut() {
        config = config.appender(file_appender.appender()?);
    }
    if let Some(err_file_appender) = err_file_appender.as_mut() {
        config = config.appender(err_file_appender.appender()?);
    }
    let config = config
        .loggers(loggers.items())
        .build(Root::builder().appenders(appenders).build(loggers.root_level()))
        .map_err(|err| LogError::Config(err.to_string()))?;

    log4rs::init_config(config).map_err(|err| LogError::Init(err.to_string()))?;
    Ok(())
}

/// Tries to init the global logger, but does not panic if it was already setup.
/// Should be used for tests.
pub fn try_init_logger(filters: &str) {
    let _ = init_logger(None, filters);
}

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => {
        log::trace!($($t)*);
    };
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => {
        log::debug!($($t)*);
    };
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => {
        log::info!($($t)*);
    };
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {
        log::warn!($($t)*);
    };
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => {
        log::error!($($t)*);
    };
}
