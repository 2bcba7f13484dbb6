//! different utility modules used throughout the project
/// TOML configuration of logging and evaluation policies
pub mod config;
/// terminal and file logging setup
pub mod logger;
