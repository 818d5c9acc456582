use std::{
    fmt,
    hash::{Hash, Hasher},
    io,
    marker::PhantomData,
    sync::Arc,
};

use serde::{de, de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use tokio::net::TcpStream;

use crate::{
    contract,
    messages::{self, CallRequest, Failure, Reply},
    protocol::CallChannel,
    EndpointAddress, RemoteError, RemoteInterface, RemoteInterfaceDescriptor, RmiError,
    RmiErrorKind, Skeleton, SkeletonHooks, StubError, RMI_FAILURE,
};

/// RMI stub: a local stand-in for the server object behind a skeleton.
///
/// `Stub<dyn Trait>` implements `Trait` for every `#[remote_interface]`
/// trait. Each method call opens a fresh connection to the stub's address,
/// runs one exchange and closes it, so a stub holds no connection and is
/// never mutated; it can be cloned and shared freely.
///
/// Two stubs are equal when they describe the same interface and point at the
/// same address. Stubs serialize, so they can be passed to and returned from
/// remote methods.
pub struct Stub<I: RemoteInterface + ?Sized> {
    interface: Arc<RemoteInterfaceDescriptor>,
    address: EndpointAddress,
    _marker: PhantomData<fn() -> Arc<I>>,
}

impl<I: RemoteInterface + ?Sized> Stub<I> {
    /// Creates a stub for the address a skeleton is (or will be) listening
    /// on. A wildcard listening address is replaced with loopback.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the skeleton was created without an address and has
    /// not been started.
    ///
    /// # Panics
    ///
    /// Panics if `I` is not a valid remote interface.
    pub fn from_skeleton<H: SkeletonHooks>(skeleton: &Skeleton<I, H>) -> Result<Self, StubError> {
        let interface = checked_descriptor::<I>();
        let address = skeleton.address().ok_or_else(|| {
            StubError::IllegalState("skeleton has no address and has not been started".into())
        })?;
        Ok(Self::with_descriptor(interface, address.or_loopback()))
    }

    /// Creates a stub for the skeleton's port on `hostname`, for when the
    /// skeleton's own address is not reachable by whoever will use the stub.
    ///
    /// # Errors
    ///
    /// `NullArgument` if `hostname` is empty, `IllegalState` if the skeleton
    /// has no port assigned yet.
    ///
    /// # Panics
    ///
    /// Panics if `I` is not a valid remote interface.
    pub fn from_skeleton_with_hostname<H: SkeletonHooks>(
        skeleton: &Skeleton<I, H>,
        hostname: &str,
    ) -> Result<Self, StubError> {
        let interface = checked_descriptor::<I>();
        if hostname.is_empty() {
            return Err(StubError::NullArgument("hostname"));
        }
        match skeleton.address() {
            Some(address) if address.port() != 0 => Ok(Self::with_descriptor(
                interface,
                EndpointAddress::new(hostname, address.port()),
            )),
            _ => Err(StubError::IllegalState("skeleton has no port assigned".into())),
        }
    }

    /// Creates a stub for a skeleton known only by its address. This is how
    /// the first stub gets made when there is no other way to obtain one.
    ///
    /// # Panics
    ///
    /// Panics if `I` is not a valid remote interface.
    #[must_use]
    pub fn from_address(address: EndpointAddress) -> Self {
        Self::with_descriptor(checked_descriptor::<I>(), address)
    }

    fn with_descriptor(interface: RemoteInterfaceDescriptor, address: EndpointAddress) -> Self {
        Self {
            interface: Arc::new(interface),
            address,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    #[must_use]
    pub fn descriptor(&self) -> &RemoteInterfaceDescriptor {
        &self.interface
    }

    /// Calls a method that returns a value. Used by `#[remote_interface]`.
    #[doc(hidden)]
    pub async fn invoke<A, R, E>(&self, method: &str, parameter_types: &[&str], args: A) -> Result<R, E>
    where
        A: Serialize,
        R: DeserializeOwned,
        E: RemoteError,
    {
        match self.call(method, parameter_types, &args, true).await? {
            Some(value) => messages::decode(&value).map_err(rmi_failure),
            None => Err(rmi_failure(RmiError::new(
                RmiErrorKind::Protocol,
                format!("{method} returned no value"),
            ))),
        }
    }

    /// Calls a method that returns nothing. Used by `#[remote_interface]`.
    #[doc(hidden)]
    pub async fn invoke_void<A, E>(&self, method: &str, parameter_types: &[&str], args: A) -> Result<(), E>
    where
        A: Serialize,
        E: RemoteError,
    {
        self.call(method, parameter_types, &args, false).await.map(drop)
    }

    async fn call<A: Serialize, E: RemoteError>(
        &self,
        method: &str,
        parameter_types: &[&str],
        args: &A,
        returns_value: bool,
    ) -> Result<Option<bytes::Bytes>, E> {
        let request = CallRequest {
            method: method.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
            arguments: messages::encode(args).map_err(rmi_failure)?,
        };
        tracing::debug!("calling {}::{method} at {}", self.interface.name, self.address);

        match self.exchange(&request, returns_value).await {
            Ok(Reply::Success(value)) => Ok(value),
            Ok(Reply::Failure(Failure::Application(payload))) => {
                Err(messages::decode(&payload).unwrap_or_else(|e: RmiError| {
                    rmi_failure(RmiError::new(
                        RmiErrorKind::Protocol,
                        format!("undecodable failure from {method}: {e}"),
                    ))
                }))
            }
            Ok(Reply::Failure(Failure::Rmi(error))) => Err(rmi_failure(error)),
            Err(e) => Err(transport_failure(e)),
        }
    }

    async fn exchange(&self, request: &CallRequest, returns_value: bool) -> io::Result<Reply> {
        let stream = TcpStream::connect((self.address.host(), self.address.port())).await?;
        let mut channel = CallChannel::new(stream);
        channel.send_request(request).await?;
        let reply = channel.read_reply(returns_value).await?;
        // The reply is complete; a failed hang-up changes nothing for the caller.
        let _ = channel.close().await;
        Ok(reply)
    }
}

fn checked_descriptor<I: RemoteInterface + ?Sized>() -> RemoteInterfaceDescriptor {
    let interface = I::descriptor();
    contract::enforce(&interface);
    interface
}

/// Raises an RMI failure as the method's error type.
///
/// Every method's error type was checked to declare RMI failures when the
/// stub was created, so an error type that refuses one is a broken
/// `RemoteError` implementation.
fn rmi_failure<E: RemoteError>(error: RmiError) -> E {
    match E::from_rmi(error) {
        Ok(e) => e,
        Err(error) => panic!(
            "error type declaring {:?} refused {RMI_FAILURE} `{error}`",
            E::DECLARED
        ),
    }
}

fn transport_failure<E: RemoteError>(error: io::Error) -> E {
    match E::from_transport(error) {
        Ok(e) => e,
        Err(error) => rmi_failure(RmiError::transport(error)),
    }
}

impl<I: RemoteInterface + ?Sized> Clone for Stub<I> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            address: self.address.clone(),
            _marker: PhantomData,
        }
    }
}

impl<I: RemoteInterface + ?Sized> PartialEq for Stub<I> {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface && self.address == other.address
    }
}

impl<I: RemoteInterface + ?Sized> Eq for Stub<I> {}

impl<I: RemoteInterface + ?Sized> Hash for Stub<I> {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.interface.hash(state);
        self.address.hash(state);
    }
}

impl<I: RemoteInterface + ?Sized> fmt::Display for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stub at {}", self.interface.name, self.address)
    }
}

impl<I: RemoteInterface + ?Sized> fmt::Debug for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("interface", &self.interface.name)
            .field("address", &self.address)
            .finish()
    }
}

#[derive(Serialize)]
struct StubRef<'a> {
    interface: &'a RemoteInterfaceDescriptor,
    address: &'a EndpointAddress,
}

#[derive(Deserialize)]
struct StubRepr {
    interface: RemoteInterfaceDescriptor,
    address: EndpointAddress,
}

impl<I: RemoteInterface + ?Sized> Serialize for Stub<I> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StubRef {
            interface: &self.interface,
            address: &self.address,
        }
        .serialize(serializer)
    }
}

impl<'de, I: RemoteInterface + ?Sized> Deserialize<'de> for Stub<I> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = StubRepr::deserialize(deserializer)?;
        let expected = checked_descriptor::<I>();
        if repr.interface != expected {
            return Err(de::Error::custom(format!(
                "stub is for interface {}, expected {}",
                repr.interface.name, expected.name
            )));
        }
        Ok(Self::with_descriptor(expected, repr.address))
    }
}
