//! A small remote method invocation runtime.
//!
//! Mark a trait with [`remote_interface`], implement it on a server object
//! with [`remote_impl`], and serve that object with a [`Skeleton`]. Callers
//! get a [`Stub`], which implements the same trait and turns every call into
//! one request/response exchange over a fresh TCP connection.
//!
//! ```ignore
//! #[remote_interface]
//! pub trait Adder {
//!     async fn add(&self, a: i32, b: i32) -> Result<i32, RmiError>;
//! }
//!
//! let skeleton = Skeleton::<dyn Adder>::new(Arc::new(MyAdder));
//! skeleton.start().await?;
//! let adder = Stub::<dyn Adder>::from_skeleton(&skeleton)?;
//! assert_eq!(adder.add(6, 80).await?, 86);
//! ```
//!
//! Every method of a remote interface must be able to fail with [`RmiError`]:
//! its error type implements [`RemoteError`] and lists [`RMI_FAILURE`] in
//! `DECLARED`. Building a skeleton or a stub over an interface that breaks
//! this rule panics.

pub mod internal_for_macro;

pub use async_trait::async_trait;
pub use rmi_macro::{remote_impl, remote_interface};

pub use address::{AddressParseError, EndpointAddress};
pub use contract::validate;
pub use descriptor::{MethodDescriptor, RemoteInterfaceDescriptor};
pub use error::{ContractViolation, RemoteError, RmiError, RmiErrorKind, StubError, RMI_FAILURE};
pub use service_tasks::{ServiceTaskGuard, ServiceTaskId, ServiceTasks};
pub use skeleton::{DefaultHooks, Skeleton, SkeletonHooks};
pub use stub::Stub;
pub use traits::RemoteInterface;

mod address;
mod contract;
mod descriptor;
mod error;
mod messages;
mod protocol;
mod service_tasks;
mod skeleton;
mod stub;
mod traits;
mod util;
