// src/error.rs
//
// Unified error handling for crunge
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - ConfigurationError: unknown algorithm, bad parameters, bad presets
// - CodecError: still-image decode/encode, structure verification, frame tools
// - IoError: reading sources, writing outputs, input limits
// - InternalBug: Library bugs (should not happen)
//
// The scanner and the corruption pipeline never fail. Malformed input is
// tolerated and passed through, so every error here comes from configuration
// or from the calling layer.

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for callers that need to branch on the kind of failure.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Rejected before any byte is processed; never retried
    ConfigurationError,
    /// Still-image codec or structural verification issues
    CodecError,
    /// Reading or writing bytes failed
    IoError,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ConfigurationError => "ConfigurationError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::IoError => "IoError",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Get the CRUNGE_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::ConfigurationError => "CRUNGE_CONFIGURATION_ERROR",
            ErrorCategory::CodecError => "CRUNGE_CODEC_ERROR",
            ErrorCategory::IoError => "CRUNGE_IO_ERROR",
            ErrorCategory::InternalBug => "CRUNGE_INTERNAL_BUG",
        }
    }
}

/// crunge error types
#[derive(Debug, Error)]
pub enum CrungeError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map file '{path}': {source}")]
    MmapFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Input of {len} bytes exceeds the configured limit of {max} bytes")]
    InputTooLarge { len: u64, max: u64 },

    // Configuration Errors
    #[error("Unknown algorithm: '{name}'")]
    UnknownAlgorithm { name: Cow<'static, str> },

    #[error("Algorithm '{algorithm}' takes {expected} parameter(s), got {actual}")]
    ParameterCount {
        algorithm: Cow<'static, str>,
        expected: Cow<'static, str>,
        actual: usize,
    },

    #[error("Invalid parameter {name}={value} for algorithm '{algorithm}': {reason}")]
    InvalidParameter {
        algorithm: Cow<'static, str>,
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("No corruption algorithm was given")]
    EmptyChain,

    #[error("Unknown preset: '{name}'. Available: classic, wide, declared")]
    InvalidPreset { name: Cow<'static, str> },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Codec Errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Marker layout changed during corruption: {message}")]
    StructureMismatch { message: Cow<'static, str> },

    #[error("External tool '{tool}' failed: {message}")]
    ExternalToolFailed {
        tool: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

fn clone_io(source: &std::io::Error) -> std::io::Error {
    std::io::Error::new(source.kind(), source.to_string())
}

impl Clone for CrungeError {
    fn clone(&self) -> Self {
        match self {
            Self::FileNotFound { path } => Self::FileNotFound { path: path.clone() },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::MmapFailed { path, source } => Self::MmapFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::InputTooLarge { len, max } => Self::InputTooLarge {
                len: *len,
                max: *max,
            },
            Self::UnknownAlgorithm { name } => Self::UnknownAlgorithm { name: name.clone() },
            Self::ParameterCount {
                algorithm,
                expected,
                actual,
            } => Self::ParameterCount {
                algorithm: algorithm.clone(),
                expected: expected.clone(),
                actual: *actual,
            },
            Self::InvalidParameter {
                algorithm,
                name,
                value,
                reason,
            } => Self::InvalidParameter {
                algorithm: algorithm.clone(),
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::EmptyChain => Self::EmptyChain,
            Self::InvalidPreset { name } => Self::InvalidPreset { name: name.clone() },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::StructureMismatch { message } => Self::StructureMismatch {
                message: message.clone(),
            },
            Self::ExternalToolFailed { tool, message } => Self::ExternalToolFailed {
                tool: tool.clone(),
                message: message.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl CrungeError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn mmap_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::MmapFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn input_too_large(len: u64, max: u64) -> Self {
        Self::InputTooLarge { len, max }
    }

    pub fn unknown_algorithm(name: impl Into<Cow<'static, str>>) -> Self {
        Self::UnknownAlgorithm { name: name.into() }
    }

    pub fn parameter_count(
        algorithm: impl Into<Cow<'static, str>>,
        expected: impl Into<Cow<'static, str>>,
        actual: usize,
    ) -> Self {
        Self::ParameterCount {
            algorithm: algorithm.into(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn invalid_parameter(
        algorithm: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidParameter {
            algorithm: algorithm.into(),
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn empty_chain() -> Self {
        Self::EmptyChain
    }

    pub fn invalid_preset(name: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidPreset { name: name.into() }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn structure_mismatch(message: impl Into<Cow<'static, str>>) -> Self {
        Self::StructureMismatch {
            message: message.into(),
        }
    }

    pub fn external_tool_failed(
        tool: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ExternalToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Configuration and I/O errors are fixed by changing the request or the
    /// environment. Codec errors depend on the data and internal bugs are not
    /// the caller's to fix.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::ConfigurationError | ErrorCategory::IoError => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownAlgorithm { .. }
            | Self::ParameterCount { .. }
            | Self::InvalidParameter { .. }
            | Self::EmptyChain
            | Self::InvalidPreset { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::ConfigurationError,

            Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::StructureMismatch { .. }
            | Self::ExternalToolFailed { .. } => ErrorCategory::CodecError,

            // InputTooLarge is a limit on the bytes handed to us, so it sits
            // with the other I/O failures of the calling layer.
            Self::FileNotFound { .. }
            | Self::FileReadFailed { .. }
            | Self::MmapFailed { .. }
            | Self::FileWriteFailed { .. }
            | Self::InputTooLarge { .. } => ErrorCategory::IoError,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }

    pub fn code(&self) -> &'static str {
        self.category().code()
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::ConfigurationError
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, CrungeError>;
