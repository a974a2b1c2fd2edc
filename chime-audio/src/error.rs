//! Error types for chime-audio
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.
//!
//! None of these are fatal to the process: activation failures roll the
//! playback controller back to its prior state, and steady-state decode
//! errors degrade toward stream end instead of aborting playback.

use thiserror::Error;

/// Main error type for chime-audio
#[derive(Error, Debug)]
pub enum Error {
    /// Missing/unreadable file or bad container header
    #[error("Failed to open sound: {0}")]
    Open(String),

    /// All voice slots are occupied
    #[error("No free voice channel (all {0} in use)")]
    NoFreeChannel(usize),

    /// Wave buffer memory could not be reserved
    #[error("Wave buffer allocation failed ({bytes} bytes)")]
    BufferAlloc { bytes: usize },

    /// Decoder cannot rewind/seek the stream
    #[error("Seek failed: {0}")]
    Seek(String),

    /// Voice worker thread could not be spawned
    #[error("Failed to spawn voice worker: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Asset/user storage path errors
    #[error("Storage path error: {0}")]
    Storage(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using chime-audio Error
pub type Result<T> = std::result::Result<T, Error>;
