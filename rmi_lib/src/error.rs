use std::{fmt, io, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Name under which every remote method must declare [`RmiError`].
pub const RMI_FAILURE: &str = "RmiError";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RmiErrorKind {
    AlreadyRunning,
    Bind,
    Listen,
    Transport,
    MethodNotFound,
    ArgumentMismatch,
    Serialization,
    Protocol,
    Other,
}

/// The RMI failure kind.
///
/// Covers everything that can go wrong with a remote call apart from the
/// called method's own errors: binding and accepting on the skeleton side,
/// connecting and exchanging frames, resolving the method, and decoding
/// values. It is serializable so that a skeleton can hand it back to the stub
/// as a failure payload. The underlying I/O error, when there is one, stays on
/// the side where it happened and is exposed through `source()`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RmiError {
    pub kind: RmiErrorKind,
    pub message: String,
    #[serde(skip)]
    cause: Option<Arc<io::Error>>,
}

impl RmiError {
    #[must_use]
    pub fn new(kind: RmiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// An application-level error expressed as an RMI failure.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(RmiErrorKind::Other, message)
    }

    #[must_use]
    pub fn from_io(kind: RmiErrorKind, cause: io::Error) -> Self {
        Self {
            kind,
            message: cause.to_string(),
            cause: Some(Arc::new(cause)),
        }
    }

    #[must_use]
    pub fn transport(cause: io::Error) -> Self {
        Self::from_io(RmiErrorKind::Transport, cause)
    }

    #[must_use]
    pub fn serialization(e: impl fmt::Display) -> Self {
        Self::new(RmiErrorKind::Serialization, e.to_string())
    }

    /// The I/O error this failure wraps, if it was raised locally by the
    /// transport.
    #[must_use]
    pub fn io_cause(&self) -> Option<&io::Error> {
        self.cause.as_deref()
    }
}

impl PartialEq for RmiError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for RmiError {}

impl fmt::Display for RmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            write!(f, "{:?}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for RmiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<rmp_serde::encode::Error> for RmiError {
    fn from(value: rmp_serde::encode::Error) -> Self {
        Self::serialization(value)
    }
}

impl From<rmp_serde::decode::Error> for RmiError {
    fn from(value: rmp_serde::decode::Error) -> Self {
        Self::serialization(value)
    }
}

/// Error type of a remote method, i.e. its declared exception set.
///
/// `DECLARED` names every failure kind the type can carry. A remote
/// interface is only valid if each method's error type lists [`RMI_FAILURE`].
pub trait RemoteError: Serialize + DeserializeOwned + Send + Sized + 'static {
    const DECLARED: &'static [&'static str];

    /// Wraps an RMI failure. Types that cannot carry one hand it back.
    ///
    /// A type whose `DECLARED` lists [`RMI_FAILURE`] must always return
    /// `Ok`. If it refuses, the stub call that hit the failure panics on the
    /// caller's task.
    fn from_rmi(error: RmiError) -> Result<Self, RmiError>;

    /// Takes a transport error as-is. Only types that explicitly anticipate
    /// I/O failures override this; everyone else gets an [`RmiError`].
    fn from_transport(error: io::Error) -> Result<Self, io::Error> {
        Err(error)
    }
}

impl RemoteError for RmiError {
    const DECLARED: &'static [&'static str] = &[RMI_FAILURE];

    fn from_rmi(error: RmiError) -> Result<Self, RmiError> {
        Ok(error)
    }
}

/// A remote interface that cannot be served or called. Always a programming
/// error in how the interface was declared.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("method `{interface}::{method}` does not declare {rmi} among its failures", rmi = RMI_FAILURE)]
    MissingRmiFailure { interface: String, method: String },
    #[error("method `{interface}::{method}` is declared more than once with the same parameter types")]
    DuplicateMethod { interface: String, method: String },
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum StubError {
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("missing argument: {0}")]
    NullArgument(&'static str),
}

impl From<StubError> for RmiError {
    fn from(value: StubError) -> Self {
        Self::other(value.to_string())
    }
}
