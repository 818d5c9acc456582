#![doc(hidden)]
//! This module is for internal usage by the rmi_macro crate only.
//!
//! Contains various exports that macros need access to.

pub use async_trait::async_trait;
pub use bytes::Bytes;
pub use futures::future::BoxFuture;

pub use crate::descriptor::{MethodDescriptor, RemoteInterfaceDescriptor};
pub use crate::error::{RemoteError, RmiError};
pub use crate::messages::{decode_arguments, encode_outcome, encode_void_outcome, Reply};
pub use crate::stub::Stub;
pub use crate::traits::{DispatchTable, Handler, RemoteInterface};
