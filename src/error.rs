//! Typed error taxonomy for the compilation pipeline.
//!
//! Every failure in the pipeline is unrecoverable for the in-progress
//! compile request: the request either fully succeeds or fails with one
//! of these kinds, and no partial artifact is cached or exposed.

use std::error::Error as StdError;
use std::fmt;

use crate::desc::PrimKind;

/// Typed error for every stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PrestoError {
    /// The bytecode stream contains an instruction outside the supported
    /// subset. Carries the mnemonic (or raw byte) of the offending opcode.
    UnsupportedOperation { opcode: String },
    /// Constructors/initializers have no native representation.
    UnsupportedMember { name: String },
    /// Operand width or kind does not match what the instruction requires.
    TypeMismatch { expected: String, got: String },
    /// Internal translator bug: malformed operand stack, undefined local,
    /// branch target off an instruction boundary, and the like.
    InvariantViolation { message: String },
    /// The backend rejected the emitted unit. Carries the backend's
    /// diagnostic text.
    ModuleVerificationFailed { message: String },
    /// An expected export was missing after linking.
    SymbolNotFound { symbol: String },
    /// A parameter or return kind outside the layout table.
    UnsupportedLayout { kind: PrimKind },
    /// An adapter invocation received the wrong number of arguments.
    ArityMismatch { expected: usize, got: usize },
    /// The handle's artifact was disposed by `Factory::teardown`.
    ArtifactRetired,
}

impl PrestoError {
    pub fn unsupported_op(opcode: impl Into<String>) -> Self {
        PrestoError::UnsupportedOperation {
            opcode: opcode.into(),
        }
    }

    pub fn unsupported_member(name: impl Into<String>) -> Self {
        PrestoError::UnsupportedMember { name: name.into() }
    }

    pub fn type_mismatch(expected: impl fmt::Display, got: impl fmt::Display) -> Self {
        PrestoError::TypeMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        PrestoError::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn verification(message: impl fmt::Display) -> Self {
        PrestoError::ModuleVerificationFailed {
            message: message.to_string(),
        }
    }

    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        PrestoError::SymbolNotFound {
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for PrestoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrestoError::UnsupportedOperation { opcode } => {
                write!(f, "unsupported instruction: {}", opcode)
            }
            PrestoError::UnsupportedMember { name } => {
                write!(f, "unsupported member: {}", name)
            }
            PrestoError::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {}, got {}", expected, got)
            }
            PrestoError::InvariantViolation { message } => {
                write!(f, "translation invariant violated: {}", message)
            }
            PrestoError::ModuleVerificationFailed { message } => {
                write!(f, "module verification failed: {}", message)
            }
            PrestoError::SymbolNotFound { symbol } => {
                write!(f, "symbol not found: {}", symbol)
            }
            PrestoError::UnsupportedLayout { kind } => {
                write!(f, "no native layout for kind: {}", kind)
            }
            PrestoError::ArityMismatch { expected, got } => {
                write!(f, "arity mismatch: expected {} arguments, got {}", expected, got)
            }
            PrestoError::ArtifactRetired => {
                write!(f, "compiled artifact was retired by teardown")
            }
        }
    }
}

impl StdError for PrestoError {}

/// Result alias used throughout the crate.
pub type PrestoResult<T> = Result<T, PrestoError>;
