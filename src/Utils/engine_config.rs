//! Engine settings: recursion limit, construction cache, default float precision and logging.
//!
//! Settings are built in code with the builder-style setters or read from TOML text:
//! ```toml
//! [engine]
//! max_depth = 512
//! cache = true
//! default_precision = 53
//!
//! [logging]
//! level = "info"
//! console = true
//! file = "auto"
//! ```
//! Unknown keys are ignored, a key of the wrong type is an error.
use crate::symbolic::symbolic_errors::SymbolicError;
use crate::symbolic::symbolic_numbers::DEFAULT_PRECISION;
use simplelog::LevelFilter;
use std::path::Path;
use std::str::FromStr;
use toml::{Table, Value};

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: LevelFilter,
    pub console: bool,
    /// log file name, `"auto"` gives `log_<date>_<time>.txt`
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LevelFilter::Info,
            console: true,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// nesting limit of recursive engine calls, exceeding it is `RecursionLimit`
    pub max_depth: usize,
    pub cache_enabled: bool,
    pub default_precision: u32,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            cache_enabled: true,
            default_precision: DEFAULT_PRECISION,
            logging: LoggingConfig::default(),
        }
    }
}

fn config_error(key: &str, expected: &str, found: &Value) -> SymbolicError {
    SymbolicError::Config(format!(
        "{} must be {}, found {}",
        key,
        expected,
        found.type_str()
    ))
}

fn read_usize(section: &Table, key: &str) -> Result<Option<usize>, SymbolicError> {
    match section.get(key) {
        None => Ok(None),
        Some(Value::Integer(n)) if *n > 0 => Ok(Some(*n as usize)),
        Some(other) => Err(config_error(key, "a positive integer", other)),
    }
}

fn read_bool(section: &Table, key: &str) -> Result<Option<bool>, SymbolicError> {
    match section.get(key) {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(config_error(key, "a boolean", other)),
    }
}

fn read_string(section: &Table, key: &str) -> Result<Option<String>, SymbolicError> {
    match section.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(config_error(key, "a string", other)),
    }
}

fn section<'a>(table: &'a Table, name: &str) -> Result<Option<&'a Table>, SymbolicError> {
    match table.get(name) {
        None => Ok(None),
        Some(Value::Table(t)) => Ok(Some(t)),
        Some(other) => Err(config_error(name, "a table", other)),
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_default_precision(mut self, prec: u32) -> Self {
        self.default_precision = prec;
        self
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.logging.level = level;
        self
    }

    pub fn with_log_file(mut self, filename: &str) -> Self {
        self.logging.file = Some(filename.to_string());
        self
    }

    pub fn with_console_logging(mut self, enabled: bool) -> Self {
        self.logging.console = enabled;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SymbolicError> {
        let table = text
            .parse::<Table>()
            .map_err(|e| SymbolicError::Config(e.to_string()))?;
        let mut config = EngineConfig::default();
        if let Some(engine) = section(&table, "engine")? {
            if let Some(depth) = read_usize(engine, "max_depth")? {
                config.max_depth = depth;
            }
            if let Some(cache) = read_bool(engine, "cache")? {
                config.cache_enabled = cache;
            }
            if let Some(prec) = read_usize(engine, "default_precision")? {
                config.default_precision = u32::try_from(prec).map_err(|_| {
                    SymbolicError::Config(format!("default_precision {} is too large", prec))
                })?;
            }
        }
        if let Some(logging) = section(&table, "logging")? {
            if let Some(level) = read_string(logging, "level")? {
                config.logging.level = LevelFilter::from_str(&level).map_err(|_| {
                    SymbolicError::Config(format!(
                        "level must be off, error, warn, info, debug or trace, found {}",
                        level
                    ))
                })?;
            }
            if let Some(console) = read_bool(logging, "console")? {
                config.logging.console = console;
            }
            config.logging.file = read_string(logging, "file")?;
        }
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SymbolicError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SymbolicError::Config(format!("{}: {}", path.display(), e)))?;
        EngineConfig::from_toml_str(&text)
    }
}
