//! different utility modules used throughout the project
/// tiny module to set up console and file logging
pub mod logger;
/// engine settings and their TOML form
pub mod engine_config;
