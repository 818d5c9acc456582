use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::{messages::Reply, RemoteInterfaceDescriptor};

/// Implemented on `dyn Trait` for every trait marked `#[remote_interface]`.
///
/// To implement this, use the `#[remote_interface]` attribute rather than
/// writing it by hand.
pub trait RemoteInterface: Send + Sync + 'static {
    fn descriptor() -> RemoteInterfaceDescriptor;

    /// Handlers for every method, keyed by name and parameter types.
    fn dispatch_table() -> DispatchTable<Self>;
}

/// Decodes the arguments, runs the method on the server object and encodes
/// the outcome.
pub type Handler<I> = Box<dyn Fn(Arc<I>, Bytes) -> BoxFuture<'static, Reply> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl MethodKey {
    #[must_use]
    pub fn new(name: impl Into<String>, parameter_types: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parameter_types,
        }
    }
}

pub struct DispatchTable<I: ?Sized> {
    handlers: HashMap<MethodKey, Handler<I>>,
}

impl<I: ?Sized> DispatchTable<I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, parameter_types: &[&str], handler: Handler<I>) {
        let key = MethodKey::new(name, parameter_types.iter().map(|t| t.to_string()).collect());
        self.handlers.insert(key, handler);
    }

    #[must_use]
    pub fn get(&self, key: &MethodKey) -> Option<&Handler<I>> {
        self.handlers.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<I: ?Sized> Default for DispatchTable<I> {
    fn default() -> Self {
        Self::new()
    }
}
