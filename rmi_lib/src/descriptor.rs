//! Data structures describing a remote interface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The shape of a remote interface: its name and every method signature.
///
/// Produced by `#[remote_interface]`, carried by every stub, and compared
/// when stubs are compared.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RemoteInterfaceDescriptor {
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub name: String,
    pub parameter_types: Vec<String>,
    /// `None` for methods that return nothing.
    pub return_type: Option<String>,
    /// Failure kinds listed by the method's error type.
    pub declared_failures: Vec<String>,
}

impl RemoteInterfaceDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, methods: Vec<MethodDescriptor>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }

    /// Finds a method by name and parameter types.
    #[must_use]
    pub fn method(&self, name: &str, parameter_types: &[String]) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameter_types == parameter_types)
    }
}

impl MethodDescriptor {
    #[must_use]
    pub fn new(
        name: &str,
        parameter_types: &[&str],
        return_type: Option<&str>,
        declared_failures: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
            return_type: return_type.map(str::to_string),
            declared_failures: declared_failures.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    #[must_use]
    pub fn declares(&self, failure: &str) -> bool {
        self.declared_failures.iter().any(|f| f == failure)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(", "))?;
        if let Some(return_type) = &self.return_type {
            write!(f, " -> {return_type}")?;
        }
        Ok(())
    }
}
