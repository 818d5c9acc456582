use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{RmiError, RmiErrorKind};

/// The message that the stub sends to the skeleton in order to call a method.
///
/// Travels as three frames: method name, parameter types, then the
/// MessagePack encoding of the argument tuple, left undecoded until the
/// method has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub method: String,
    pub parameter_types: Vec<String>,
    pub arguments: Bytes,
}

/// First frame of every response.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Payload following a [`Outcome::Failure`] tag.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// MessagePack encoding of the error value returned by the method body.
    Application(Vec<u8>),
    /// The call never reached the method body, or its result could not be
    /// encoded.
    Rmi(RmiError),
}

/// The message that the skeleton responds to the stub with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Encoded return value, or `None` for a method that returns nothing.
    Success(Option<Bytes>),
    Failure(Failure),
}

impl Reply {
    #[must_use]
    pub fn rmi_failure(error: RmiError) -> Self {
        Reply::Failure(Failure::Rmi(error))
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            Reply::Success(_) => Outcome::Success,
            Reply::Failure(_) => Outcome::Failure,
        }
    }
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, RmiError> {
    Ok(Bytes::from(rmp_serde::to_vec(value)?))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RmiError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Decodes the argument tuple of a resolved method.
pub fn decode_arguments<A: DeserializeOwned>(arguments: &[u8]) -> Result<A, Failure> {
    rmp_serde::from_slice(arguments).map_err(|e| {
        Failure::Rmi(RmiError::new(
            RmiErrorKind::ArgumentMismatch,
            format!("arguments do not match the method's parameter types: {e}"),
        ))
    })
}

/// Turns what a method body returned into the reply for the caller.
pub fn encode_outcome<T: Serialize, E: Serialize>(result: Result<T, E>) -> Reply {
    match result {
        Ok(value) => match encode(&value) {
            Ok(bytes) => Reply::Success(Some(bytes)),
            Err(e) => Reply::rmi_failure(e),
        },
        Err(error) => encode_application_failure(&error),
    }
}

/// Same as [`encode_outcome`] for methods that return nothing.
pub fn encode_void_outcome<E: Serialize>(result: Result<(), E>) -> Reply {
    match result {
        Ok(()) => Reply::Success(None),
        Err(error) => encode_application_failure(&error),
    }
}

fn encode_application_failure<E: Serialize>(error: &E) -> Reply {
    match rmp_serde::to_vec(error) {
        Ok(bytes) => Reply::Failure(Failure::Application(bytes)),
        Err(e) => Reply::rmi_failure(RmiError::serialization(e)),
    }
}
