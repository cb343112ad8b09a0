//! Operator module.
//!
//! Contains the operator registry and the built-in operator catalog.

pub mod registry;
pub mod builtin;

pub use registry::{OperatorFactory, OperatorRegistry, RegistryEntry};
