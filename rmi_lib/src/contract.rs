use std::collections::{hash_map::Entry, HashMap};

use crate::{ContractViolation, RemoteInterfaceDescriptor, RMI_FAILURE};

/// Checks that `descriptor` is shaped like a remote interface: every method
/// declares [`RMI_FAILURE`], and no signature appears twice.
///
/// # Errors
///
/// Returns the first violation found, in declaration order.
pub fn validate(descriptor: &RemoteInterfaceDescriptor) -> Result<(), ContractViolation> {
    let mut seen = HashMap::new();
    for method in &descriptor.methods {
        if !method.declares(RMI_FAILURE) {
            return Err(ContractViolation::MissingRmiFailure {
                interface: descriptor.name.clone(),
                method: method.name.clone(),
            });
        }
        match seen.entry((&method.name, &method.parameter_types)) {
            Entry::Vacant(entry) => {
                entry.insert(());
            }
            Entry::Occupied(_) => {
                return Err(ContractViolation::DuplicateMethod {
                    interface: descriptor.name.clone(),
                    method: method.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Like [`validate`], but a violation aborts construction of whatever is
/// being built over the interface.
pub(crate) fn enforce(descriptor: &RemoteInterfaceDescriptor) {
    if let Err(violation) = validate(descriptor) {
        panic!("{} is not a remote interface: {violation}", descriptor.name);
    }
}
