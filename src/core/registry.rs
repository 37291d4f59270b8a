//! Signature → handler table shared by the worker pool.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::core::{Handler, Operand, OutputShape, RegistryError};

/// Table of registered handlers keyed by task signature.
///
/// Registration validates the handler's shape once, so the pool never has to
/// call something that can not possibly accept a task. Lookups take a read lock
/// and clone the (cheap, `Arc`-backed) operand out.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Operand>>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `signature`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// See [`register_operand`](Self::register_operand).
    pub fn register<H, Args>(
        &self,
        signature: impl Into<String>,
        handler: H,
    ) -> Result<(), RegistryError>
    where
        H: Handler<Args>,
    {
        self.register_operand(signature, Operand::handler(handler))
    }

    /// Register an already erased operand.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotAFunction`] if the operand is not callable.
    /// - [`RegistryError::TooFewParameters`] if it takes fewer than two parameters.
    /// - [`RegistryError::FirstArgNotCapability`] if its first parameter can not take the capability.
    /// - [`RegistryError::OperandResultMismatch`] if it does not return a single error result.
    pub fn register_operand(
        &self,
        signature: impl Into<String>,
        operand: Operand,
    ) -> Result<(), RegistryError> {
        let signature = signature.into();
        let handler = match &operand {
            Operand::Handler(handler) => handler,
            Operand::Value(name) => return Err(RegistryError::NotAFunction((*name).to_string())),
        };

        let params = handler.params();
        if params.len() < 2 {
            return Err(RegistryError::TooFewParameters(params.len()));
        }
        if !params[0].accepts_capability() {
            return Err(RegistryError::FirstArgNotCapability);
        }
        if handler.output() != OutputShape::Error {
            return Err(RegistryError::OperandResultMismatch);
        }

        let previous = self.handlers.write().insert(signature.clone(), operand);
        if previous.is_some() {
            warn!(signature = %signature, "replaced existing handler");
        } else {
            debug!(signature = %signature, "registered handler");
        }
        Ok(())
    }

    /// Look up the handler for `signature`.
    #[must_use]
    pub fn lookup(&self, signature: &str) -> Option<Operand> {
        self.handlers.read().get(signature).cloned()
    }

    /// Whether a handler is registered for `signature`.
    #[must_use]
    pub fn contains(&self, signature: &str) -> bool {
        self.handlers.read().contains_key(signature)
    }

    /// Registered signatures, sorted.
    #[must_use]
    pub fn signatures(&self) -> Vec<String> {
        let mut signatures: Vec<String> = self.handlers.read().keys().cloned().collect();
        signatures.sort();
        signatures
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
