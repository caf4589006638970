//! Capability providers and their operations.
//!
//! A provider is a named bundle of operations. Consumers fetch an operation
//! by name and call it on flat `f32` buffers; they never learn whether the
//! provider is the accelerated one or the stand-in until an operation fails.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{validate_name, CompatError};

type OpFn = dyn Fn(&[f32]) -> Result<Vec<f32>, CompatError> + Send + Sync;

/// A callable handle to one operation of a provider.
#[derive(Clone)]
pub struct Operation {
    capability: Arc<str>,
    name: Arc<str>,
    body: Arc<OpFn>,
}

impl Operation {
    pub fn new<F>(capability: &str, name: &str, body: F) -> Self
    where
        F: Fn(&[f32]) -> Result<Vec<f32>, CompatError> + Send + Sync + 'static,
    {
        Self {
            capability: Arc::from(capability),
            name: Arc::from(name),
            body: Arc::new(body),
        }
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the operation on `input`.
    pub fn call(&self, input: &[f32]) -> Result<Vec<f32>, CompatError> {
        (self.body)(input)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation({}.{})", self.capability, self.name)
    }
}

/// Shared interface of the accelerated provider and its stand-in.
pub trait CapabilityProvider: Send + Sync + fmt::Debug {
    /// Symbolic name the provider is bound under.
    fn name(&self) -> &str;

    /// Look up an operation by name.
    fn operation(&self, operation: &str) -> Result<Operation, CompatError>;

    /// Look up `operation` and run it on `input`.
    fn call(&self, operation: &str, input: &[f32]) -> Result<Vec<f32>, CompatError> {
        self.operation(operation)?.call(input)
    }
}

/// Substitute provider bound when the native extension is not installed.
///
/// Every operation lookup fails with `CompatError::Unavailable`; nothing is
/// cached, so each access fails on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandInProvider {
    capability: String,
}

impl StandInProvider {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
        }
    }
}

impl CapabilityProvider for StandInProvider {
    fn name(&self) -> &str {
        &self.capability
    }

    fn operation(&self, operation: &str) -> Result<Operation, CompatError> {
        Err(CompatError::unavailable(&self.capability, operation))
    }
}

/// Provider whose operations are supplied by the host process itself.
///
/// Used for accelerators linked into the binary and for tests.
#[derive(Clone)]
pub struct InProcessProvider {
    name: String,
    ops: BTreeMap<String, Operation>,
}

impl InProcessProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ops: BTreeMap::new(),
        }
    }

    /// Add an operation. Names must be `[A-Za-z0-9_]+`.
    pub fn with_operation<F>(mut self, operation: &str, body: F) -> Result<Self, CompatError>
    where
        F: Fn(&[f32]) -> Result<Vec<f32>, CompatError> + Send + Sync + 'static,
    {
        validate_name(operation)?;
        let op = Operation::new(&self.name, operation, body);
        self.ops.insert(operation.to_string(), op);
        Ok(self)
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }
}

impl fmt::Debug for InProcessProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessProvider")
            .field("name", &self.name)
            .field("ops", &self.ops.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityProvider for InProcessProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn operation(&self, operation: &str) -> Result<Operation, CompatError> {
        self.ops
            .get(operation)
            .cloned()
            .ok_or_else(|| CompatError::MissingOperation {
                capability: self.name.clone(),
                operation: operation.to_string(),
            })
    }
}
