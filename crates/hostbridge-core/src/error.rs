//! Shared error type across hostbridge crates.

use std::fmt;

use thiserror::Error;

/// Stable error classification (callers branch on this, not on messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed wire data or unknown tags. Always fatal to the query.
    Protocol,
    /// Unregistered or duplicate class/instance.
    Registry,
    /// Attribute/method lookup or construction failed.
    Dispatch,
    /// An operand lacks equality, ordering or iteration.
    Capability,
    /// The host does not support the requested feature.
    Unsupported,
    /// The native engine reported an error.
    Engine,
    /// A registered host method or adapter failed.
    Application,
    /// Invalid bridge configuration.
    Config,
}

impl ErrorKind {
    /// String representation used in logs and error reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::Registry => "REGISTRY",
            ErrorKind::Dispatch => "DISPATCH",
            ErrorKind::Capability => "CAPABILITY",
            ErrorKind::Unsupported => "UNSUPPORTED",
            ErrorKind::Engine => "ENGINE",
            ErrorKind::Application => "APPLICATION",
            ErrorKind::Config => "CONFIG",
        }
    }
}

/// Why an invocation was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidCallReason {
    /// The attribute exists but is not invocable.
    NotCallable,
    /// Wrong number of positional arguments for a non-variadic member.
    Arity { expected: usize, actual: usize },
    /// Too few positional arguments before the variadic tail.
    TooFewArguments { required: usize, actual: usize },
    /// An argument could not be converted to the parameter type.
    Argument(String),
}

impl fmt::Display for InvalidCallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidCallReason::NotCallable => write!(f, "not a function"),
            InvalidCallReason::Arity { expected, actual } => {
                write!(f, "incorrect number of arguments. Expected {expected}, got {actual}")
            }
            InvalidCallReason::TooFewArguments { required, actual } => {
                write!(f, "expected at least {required} arguments, got {actual}")
            }
            InvalidCallReason::Argument(msg) => write!(f, "bad argument: {msg}"),
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type used by core and host.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed value: {0}")]
    MalformedValue(String),
    #[error("unknown variant for {ty}: {tag}")]
    UnknownVariant { ty: &'static str, tag: String },
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("Unregistered class: {name}")]
    UnregisteredClass { name: String },
    #[error("Unregistered instance: {id}.")]
    UnregisteredInstance { id: u64 },
    #[error("Attempted to alias {new} as '{name}', but {existing} already has that alias.")]
    DuplicateClassAlias {
        name: String,
        existing: String,
        new: String,
    },
    #[error("Attempted to register instance {id}, but an instance with that ID already exists.")]
    DuplicateInstanceRegistration { id: u64 },

    #[error("'{receiver}' object has no attribute '{attribute}'")]
    MissingAttribute { receiver: String, attribute: String },
    #[error("{receiver}.{attribute}: {reason}")]
    InvalidCall {
        receiver: String,
        attribute: String,
        reason: InvalidCallReason,
    },
    #[error("{constructor} is not a constructor: {info}")]
    InvalidConstructor { constructor: String, info: String },
    #[error("expected {expected}, found {found}")]
    Conversion { expected: String, found: String },
    #[error("{instance} is not iterable")]
    InvalidIterator { instance: String },

    #[error("received Expression from the engine; expressions are only accepted when data filtering is enabled (did the policy operate on an unbound variable?)")]
    UnexpectedExpression,
    #[error("keyword arguments are not supported by this host")]
    Kwargs,
    #[error("{instance} does not support operation '{operation}'")]
    UnsupportedOperation { instance: String, operation: String },
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("invalid query event: {0}")]
    InvalidQueryEvent(String),
    #[error("Inline query failed: {query}")]
    InlineQueryFailed { query: String },
    #[error("engine error: {0}")]
    Engine(String),
    #[error("application error: {0}")]
    Application(String),
    #[error("data filtering: {0}")]
    DataFilter(String),
    #[error("config: {0}")]
    Config(String),
}

impl BridgeError {
    /// Map the error to its stable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::MalformedValue(_)
            | BridgeError::UnknownVariant { .. }
            | BridgeError::Serialization(_)
            | BridgeError::InvalidQueryEvent(_) => ErrorKind::Protocol,
            BridgeError::UnregisteredClass { .. }
            | BridgeError::UnregisteredInstance { .. }
            | BridgeError::DuplicateClassAlias { .. }
            | BridgeError::DuplicateInstanceRegistration { .. } => ErrorKind::Registry,
            BridgeError::MissingAttribute { .. }
            | BridgeError::InvalidCall { .. }
            | BridgeError::InvalidConstructor { .. }
            | BridgeError::Conversion { .. } => ErrorKind::Dispatch,
            BridgeError::InvalidIterator { .. } | BridgeError::UnsupportedOperation { .. } => {
                ErrorKind::Capability
            }
            BridgeError::UnexpectedExpression
            | BridgeError::Kwargs
            | BridgeError::UnsupportedOperator(_) => ErrorKind::Unsupported,
            BridgeError::Engine(_) | BridgeError::InlineQueryFailed { .. } => ErrorKind::Engine,
            BridgeError::Application(_) | BridgeError::DataFilter(_) => ErrorKind::Application,
            BridgeError::Config(_) => ErrorKind::Config,
        }
    }

    /// Lookup failures the engine is told about (application error + null
    /// result) instead of aborting the query.
    pub fn is_reportable_lookup(&self) -> bool {
        matches!(
            self,
            BridgeError::MissingAttribute { .. } | BridgeError::InvalidCall { .. }
        )
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Serialization(e.to_string())
    }
}
