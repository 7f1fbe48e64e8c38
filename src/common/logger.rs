//! 日志配置模块
//! logger setup, all crate code logs through the tag macros below

use std::io::Error;
use pretty_env_logger;

/// init the logger backend, calling it twice does nothing
pub fn init_logger(log_level: &str) -> Result<(), Error> {
    // check if it is already initialized
    if log::max_level() != log::LevelFilter::Off {
        return Ok(())
    }

    let result = pretty_env_logger::formatted_builder()
        .target(pretty_env_logger::env_logger::Target::Stdout)
        .filter_level(parse_level(log_level))
        .try_init();

    // another test thread may have won the race
    if result.is_err() {
        return Ok(())
    }
    log::info!("logger initialized, level: {}", log_level);
    Ok(())
}

fn parse_level(log_level: &str) -> log::LevelFilter {
    match log_level {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info
    }
}


#[doc(hidden)]
pub use log as __log;

/// 带 TAG 的日志宏共用的展开, every level goes through here
#[doc(hidden)]
#[macro_export]
macro_rules! tagged_log {
    ($level:ident, $tag:expr, $($arg:tt)*) => ({
        $crate::common::logger::__log::$level!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

/// log with TAG, e.g. `info!(LOG_TAG, "device: {}", name)`
#[macro_export]
macro_rules! warn {
    ($tag:expr, $($arg:tt)*) => ($crate::tagged_log!(warn, $tag, $($arg)*))
}

#[macro_export]
macro_rules! error {
    ($tag:expr, $($arg:tt)*) => ($crate::tagged_log!(error, $tag, $($arg)*))
}

#[macro_export]
macro_rules! info {
    ($tag:expr, $($arg:tt)*) => ($crate::tagged_log!(info, $tag, $($arg)*))
}

#[macro_export]
macro_rules! debug {
    ($tag:expr, $($arg:tt)*) => ($crate::tagged_log!(debug, $tag, $($arg)*))
}

#[macro_export]
macro_rules! trace {
    ($tag:expr, $($arg:tt)*) => ($crate::tagged_log!(trace, $tag, $($arg)*))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), log::LevelFilter::Debug);
        assert_eq!(parse_level("nonsense"), log::LevelFilter::Info);
    }

    #[test]
    fn test_init_twice() {
        assert!(init_logger("debug").is_ok());
        assert!(init_logger("debug").is_ok());
    }

    #[test]
    fn test_tag_macros_expand() {
        const LOG_TAG: &str = "logger_test";
        assert!(init_logger("trace").is_ok());
        let name = "ai_rack";
        crate::trace!(LOG_TAG, "device: {}", name);
        crate::debug!(LOG_TAG, "device: {}, count: {}", name, 3);
        crate::info!(LOG_TAG, "plain message");
        crate::warn!(LOG_TAG, "device: {}", name);
        crate::error!(LOG_TAG, "device: {}, error: {:?}", name, Some(1));
    }
}
