//! Error types for wynbot

use thiserror::Error;

/// Result type alias for wynbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in wynbot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Archive has an unrecognized top-level shape
    #[error("archive format error: {0}")]
    ArchiveFormat(String),

    /// Model cache file exists, is non-empty, and cannot be decoded
    #[error("cache decode error: {0}")]
    CacheDecode(String),

    /// OAuth2 token exchange failed (network, non-2xx, or missing fields)
    #[error("credential exchange error: {0}")]
    CredentialExchange(String),

    /// Server certificate does not chain to the expected service identity
    #[error("certificate trust error: {0}")]
    CertificateTrust(String),

    /// Server returned an explicit protocol error for the roster request
    #[error("roster error: {0}")]
    RosterProtocol(String),

    /// Session-level failure (connection dropped, handshake refused)
    #[error("session error: {0}")]
    Session(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
