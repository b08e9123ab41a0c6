//! The engine handle.
//!
//! [`Engine`] is a cheap-clone handle over the raw engine boundary. All
//! higher-level types (slots, owned values, lazy chains, tables, call
//! contexts) hold or borrow one. The handle adds no state of its own; the
//! engine instance behind it owns all value storage.

use std::fmt;
use std::rc::Rc;

use crate::convert::ToValue;
use crate::error::{BindError, CallError};
use crate::lazy::Lazy;
use crate::owned::OwnedValue;
use crate::raw::RawEngine;
use crate::raw::mock::MockEngine;
use crate::slot::Slot;
use crate::table::Table;
use crate::types::Value;

/// Handle to one engine instance.
///
/// Cloning the handle does not clone the engine; it is an `Rc` over the
/// boundary trait. The whole binding is single-threaded by contract, like
/// the engine itself.
#[derive(Clone)]
pub struct Engine {
    raw: Rc<dyn RawEngine>,
}

impl Engine {
    /// Wrap a raw engine implementation.
    pub fn new(raw: impl RawEngine + 'static) -> Self {
        Engine { raw: Rc::new(raw) }
    }

    /// Wrap an already-shared raw engine. Useful when the caller needs to
    /// keep its own handle to the implementation (the test suite does this
    /// to observe [`MockEngine::op_count`]).
    pub fn from_shared(raw: Rc<dyn RawEngine>) -> Self {
        Engine { raw }
    }

    /// Fresh in-memory engine, for tests and examples.
    pub fn mock() -> Self {
        Engine::new(MockEngine::new())
    }

    /// The raw engine boundary.
    pub fn raw(&self) -> &dyn RawEngine {
        self.raw.as_ref()
    }

    /// Current stack depth.
    pub fn top(&self) -> u32 {
        self.raw.top()
    }

    /// Reference the live slot at `index`, if any.
    pub fn slot(&self, index: u32) -> Option<Slot<'_>> {
        if index >= 1 && index <= self.raw.top() {
            Some(Slot::new(self, index))
        } else {
            None
        }
    }

    /// Convert a native value and push it, returning the fresh slot.
    pub fn push(&self, v: impl ToValue) -> Slot<'_> {
        self.push_value(v.to_value())
    }

    /// Defer a native value into an unforced lazy constant.
    pub fn lazy(&self, v: impl ToValue) -> Lazy<'_> {
        Lazy::constant(self, v.to_value())
    }

    /// Create a fresh engine-side table, held by persistent reference so the
    /// proxy survives frame unwinds.
    pub fn create_table(&self) -> Table<'_> {
        self.raw.create_table();
        let slot = Slot::new(self, self.raw.top());
        let owned = OwnedValue::acquire(&slot);
        self.raw.pop(1);
        Table::new(Lazy::constant(self, Value::Handle(owned)))
    }

    pub(crate) fn push_value(&self, v: Value) -> Slot<'_> {
        match v {
            Value::Nil => self.raw.push_nil(),
            Value::Bool(b) => self.raw.push_bool(b),
            Value::Int(i) => self.raw.push_int(i),
            Value::Float(f) => self.raw.push_float(f),
            Value::Str(s) => self.raw.push_str(&s),
            Value::Handle(h) => self.raw.push_ref(h.raw_ref()),
            Value::Native(f) => self.raw.push_native(f),
            Value::User { data, class } => self.raw.push_userdata(data, class),
        }
        Slot::new(self, self.raw.top())
    }

    /// Open a scope that restores the stack to its current depth on drop.
    pub(crate) fn guard(&self) -> StackGuard<'_> {
        StackGuard {
            engine: self,
            mark: self.raw.top(),
        }
    }

    /// Convert the fault payload the engine left on the stack top into a
    /// [`BindError::Call`], popping it.
    pub(crate) fn take_fault(&self) -> BindError {
        let payload = self
            .slot(self.raw.top())
            .and_then(|s| s.snapshot().ok())
            .unwrap_or(Value::Nil);
        self.raw.pop(1);
        BindError::Call(CallError::new(payload))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("top", &self.raw.top())
            .finish_non_exhaustive()
    }
}

/// Restores the stack to a recorded depth when dropped. Never grows the
/// stack; values at or below the mark are untouched, so partial failures
/// inside a guarded region cannot leak scratch slots.
pub(crate) struct StackGuard<'e> {
    engine: &'e Engine,
    mark: u32,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        if self.engine.raw().top() > self.mark {
            self.engine.raw().set_top(self.mark);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_returns_top_slot() {
        let engine = Engine::mock();
        let slot = engine.push(42i64);
        assert_eq!(slot.index(), 1);
        assert_eq!(engine.top(), 1);
    }

    #[test]
    fn guard_restores_depth() {
        let engine = Engine::mock();
        engine.push(1i64);
        {
            let _g = engine.guard();
            engine.push("scratch");
            engine.push("more scratch");
        }
        assert_eq!(engine.top(), 1);
    }

    #[test]
    fn slot_out_of_range_is_none() {
        let engine = Engine::mock();
        assert!(engine.slot(1).is_none());
        engine.push(true);
        assert!(engine.slot(1).is_some());
        assert!(engine.slot(2).is_none());
    }
}
