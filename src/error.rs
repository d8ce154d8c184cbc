use std::fmt;

/// Error type returned by kiwi-bridge public APIs.
#[derive(Debug)]
pub enum BridgeError {
    /// Dynamic library could not be loaded.
    LibraryLoad(String),
    /// Required symbol could not be resolved from the library.
    SymbolLoad(String),
    /// Rust string contained an interior `NUL` byte for C interop.
    NulByte(std::ffi::NulError),
    /// Analyzer handle argument was null or unusable.
    InvalidHandle(String),
    /// User-provided arguments were invalid.
    InvalidInput(String),
    /// Analyzer initialization failed before a usable instance existed.
    Init(String),
    /// Error reported by the Kiwi C API.
    Api(String),
    /// Output payload could not be assembled.
    Serialization(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::LibraryLoad(message) => write!(f, "failed to load library: {message}"),
            BridgeError::SymbolLoad(message) => write!(f, "failed to load symbol: {message}"),
            BridgeError::NulByte(error) => write!(f, "string contains NUL byte: {error}"),
            BridgeError::InvalidHandle(message) => write!(f, "invalid handle: {message}"),
            BridgeError::InvalidInput(message) => write!(f, "invalid argument: {message}"),
            BridgeError::Init(message) => write!(f, "initialization failed: {message}"),
            BridgeError::Api(message) => write!(f, "kiwi api error: {message}"),
            BridgeError::Serialization(message) => write!(f, "serialization failed: {message}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::ffi::NulError> for BridgeError {
    fn from(value: std::ffi::NulError) -> Self {
        BridgeError::NulByte(value)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;
