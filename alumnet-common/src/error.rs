//! Shared error type for Alumnet crates

use thiserror::Error;

/// Result alias used by `alumnet-common` APIs
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Config file could not be read from disk
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML or holds out-of-range settings
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A value such as an audience name did not parse
    #[error("invalid value: {0}")]
    InvalidInput(String),
}
