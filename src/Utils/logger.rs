use crate::Utils::engine_config::LoggingConfig;
use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;

/// `"auto"` becomes a timestamped name, anything else is used as given
pub fn resolve_log_file(name: &str) -> String {
    if name == "auto" {
        let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("log_{}.txt", date_and_time)
    } else {
        name.to_string()
    }
}

/// Console and file sinks described by the settings. A log file that cannot be created is
/// skipped.
pub fn build_loggers(settings: &LoggingConfig) -> Vec<Box<dyn SharedLogger>> {
    let level = settings.level;
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    // Console logger
    if settings.console {
        loggers.push(TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }

    // File logger
    if let Some(ref filename) = settings.file {
        if let Ok(file) = File::create(resolve_log_file(filename)) {
            loggers.push(WriteLogger::new(level, Config::default(), file));
        }
    }

    loggers
}

/// Initialize the global logger from the logging settings.
/// Returns false if nothing was installed (no sink enabled, or a logger is already set).
pub fn init_logger(settings: &LoggingConfig) -> bool {
    let loggers = build_loggers(settings);
    if loggers.is_empty() {
        return false;
    }
    CombinedLogger::init(loggers).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simplelog::LevelFilter;

    #[test]
    fn test_resolve_log_file() {
        assert_eq!(resolve_log_file("engine.log"), "engine.log");
        let auto = resolve_log_file("auto");
        assert!(auto.starts_with("log_"));
        assert!(auto.ends_with(".txt"));
    }

    #[test]
    fn test_init_logger_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.log");
        let settings = LoggingConfig {
            level: LevelFilter::Debug,
            console: false,
            file: Some(path.to_string_lossy().to_string()),
        };
        assert_eq!(build_loggers(&settings).len(), 1);
        assert!(path.exists());
        let installed = init_logger(&settings);
        // only a logger installed earlier in this process can make the call fail
        assert!(installed || log::max_level() != LevelFilter::Off);
    }

    #[test]
    fn test_no_sinks() {
        let settings = LoggingConfig {
            level: LevelFilter::Info,
            console: false,
            file: None,
        };
        assert!(build_loggers(&settings).is_empty());
        assert!(!init_logger(&settings));
    }
}
