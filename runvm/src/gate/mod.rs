//! Pre-flight checks run before any supervisor is spawned.

mod namespace;
mod privilege;

pub use namespace::check_namespaces;
pub use privilege::{EffectiveUidGate, PrivilegeGate};
