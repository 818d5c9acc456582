//! Data structures representing a remote interface.

use quote::ToTokens;
use syn::{Ident, ReturnType, Type};

/// A trait marked `#[remote_interface]`, reduced to what code generation
/// needs.
#[derive(Clone)]
pub struct RemoteTrait {
    pub name: Ident,
    pub methods: Vec<RemoteMethod>,
}

#[derive(Clone)]
pub struct RemoteMethod {
    pub name: Ident,
    /// Types of the parameters after `&self`, in order.
    pub params: Vec<Type>,
    /// The full return type as written, `Result<T, E>`.
    pub output: ReturnType,
    pub ok_type: Type,
    pub err_type: Type,
}

impl RemoteMethod {
    /// Methods returning `Result<(), E>` return nothing on the wire.
    pub fn is_void(&self) -> bool {
        matches!(&self.ok_type, Type::Tuple(tuple) if tuple.elems.is_empty())
    }

    pub fn param_type_names(&self) -> Vec<String> {
        self.params.iter().map(type_name).collect()
    }

    pub fn return_type_name(&self) -> Option<String> {
        if self.is_void() {
            None
        } else {
            Some(type_name(&self.ok_type))
        }
    }
}

/// Spelling of a type used in signatures on the wire. Whitespace is dropped
/// so the spelling does not depend on how the trait was formatted.
pub fn type_name(ty: &Type) -> String {
    ty.to_token_stream()
        .to_string()
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect()
}
