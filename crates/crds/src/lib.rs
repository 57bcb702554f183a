//! Machine API resource types
//!
//! Kubernetes resource bindings for OpenShift Machines and MachineSets, and
//! the cloudscale provider payloads carried inside them.

pub mod codec;
pub mod machine;
pub mod provider;

pub use codec::*;
pub use machine::*;
pub use provider::*;
