//! Error taxonomy of the binding layer.
//!
//! Conversion and lookup failures surface to the immediate caller as
//! [`BindError`] values; nothing is silently defaulted. Errors raised inside
//! wrapped native functions are caught at the wrapper boundary and re-raised
//! through the engine's own error mechanism; errors the engine reports during
//! a forced operation come back as [`CallError`].
//!
//! Stack-discipline violations (using a [`Slot`](crate::Slot) after its
//! owning frame unwound) are deliberately **not** part of this taxonomy: they
//! are a documented precondition checked only by debug assertions.

use thiserror::Error;

use crate::types::{KindSet, Value, ValueKind};

/// Result alias used throughout the binding.
pub type BindResult<T> = Result<T, BindError>;

/// Any failure the binding layer reports.
#[derive(Debug, Error)]
pub enum BindError {
    /// A conversion requested a kind the value does not have.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Kinds the conversion would have accepted.
        expected: KindSet,
        /// Kind actually found in the slot.
        actual: ValueKind,
    },

    /// An integer does not fit the requested native integer type.
    #[error("integer {value} out of range for {target}")]
    IntegerOverflow {
        /// The engine-side value.
        value: i64,
        /// Name of the requested native type.
        target: &'static str,
    },

    /// A float carries a fractional part where an integral value is required.
    #[error("number {value} has a fractional part, refusing implicit truncation to {target}")]
    NumberNotIntegral {
        /// The engine-side value.
        value: f64,
        /// Name of the requested native type.
        target: &'static str,
    },

    /// A number cannot be represented in the requested floating domain.
    #[error("number {value} cannot be represented as {target}")]
    NumberOutOfRange {
        /// The engine-side value.
        value: f64,
        /// Name of the requested native type.
        target: &'static str,
    },

    /// A userdata slot carries a different class than the requested type.
    #[error("userdata class mismatch: expected '{expected}', found '{found}'")]
    UserdataClass {
        /// Class name of the requested native type.
        expected: &'static str,
        /// Class name found in the slot.
        found: &'static str,
    },

    /// A wrapped function was invoked with fewer arguments than it extracts,
    /// or an out-of-range result was requested.
    #[error("argument {index} requested but only {supplied} supplied")]
    ArityMismatch {
        /// Zero-based index of the missing argument or result.
        index: usize,
        /// Number of arguments or results actually present.
        supplied: usize,
    },

    /// The engine's protected call (or a table operation routed through it)
    /// reported a runtime failure.
    #[error(transparent)]
    Call(#[from] CallError),

    /// Duplicate extension-type or converter registration for one native type.
    #[error("conflicting registration for native type {type_name}")]
    RegistrationConflict {
        /// `std::any::type_name` of the native type.
        type_name: &'static str,
    },

    /// No converter is registered for a type reached through the
    /// registry-only conversion path.
    #[error("no conversion registered for native type {type_name}")]
    NoConverter {
        /// `std::any::type_name` of the native type.
        type_name: &'static str,
    },

    /// An error escaping a native function, to be raised inside the engine.
    ///
    /// Produced when a wrapped callable returns `Err`; the wrapper boundary
    /// converts it into the engine's error value.
    #[error("{0}")]
    Raised(String),

    /// The process-wide conversion registry lock was poisoned by a panic
    /// during registration.
    #[error("conversion registry lock poisoned")]
    RegistryPoisoned,
}

impl BindError {
    /// Shorthand for a [`BindError::TypeMismatch`].
    pub fn mismatch(expected: KindSet, actual: ValueKind) -> Self {
        BindError::TypeMismatch { expected, actual }
    }
}

/// Runtime failure reported by the engine, carrying the engine's error value
/// converted to native form.
#[derive(Debug, Error)]
#[error("engine call failed: {message}")]
pub struct CallError {
    /// The engine's error value.
    pub payload: Value,
    /// The payload rendered for display.
    message: String,
}

impl CallError {
    pub(crate) fn new(payload: Value) -> Self {
        let message = payload.to_string();
        CallError { payload, message }
    }

    /// The rendered error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
