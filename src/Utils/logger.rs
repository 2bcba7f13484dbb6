//! Terminal + optional file logging through simplelog, set up once per process.
use crate::block::block_error::{BlockError, BlockResult};
use chrono::Local;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;

pub fn parse_level(level: &str) -> BlockResult<LevelFilter> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(BlockError::Configuration(format!(
            "loglevel must be trace, debug, info, warn, error or off, got {}",
            other
        ))),
    }
}

/// log_<date>_<time>.txt
pub fn timestamped_log_name() -> String {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("log_{}.txt", date_and_time)
}

/// Returns false when a global logger was already installed (e.g. by another test).
pub fn init_logger(level: LevelFilter, log_file: Option<&str>) -> bool {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    if let Some(filename) = log_file {
        match File::create(filename) {
            Ok(file) => loggers.push(WriteLogger::new(level, Config::default(), file)),
            Err(e) => eprintln!("can't create log file {}: {}", filename, e),
        }
    }
    CombinedLogger::init(loggers).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("Debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::Off);
        assert!(matches!(
            parse_level("loud"),
            Err(BlockError::Configuration(_))
        ));
    }

    #[test]
    fn log_names_are_timestamped() {
        let name = timestamped_log_name();
        assert!(name.starts_with("log_") && name.ends_with(".txt"));
        assert_eq!(name.len(), "log_2024-01-01_00-00-00.txt".len());
    }
}
