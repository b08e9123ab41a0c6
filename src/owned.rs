//! Reference-counted handles to engine-side values.
//!
//! An [`OwnedValue`] holds an engine-provided persistent reference, so the
//! value survives the stack frame that produced it. `Clone` increments the
//! engine-side reference count; `Drop` releases exactly once. This is the
//! only shared, frame-independent resource in the binding; everything else
//! is a scoped borrow.

use std::fmt;

use crate::convert::{FromSlot, ToValue};
use crate::engine::Engine;
use crate::error::BindResult;
use crate::lazy::Lazy;
use crate::raw::RawRef;
use crate::slot::Slot;
use crate::table::Table;
use crate::types::{Value, ValueKind};

/// A value kept alive by an engine-side persistent reference.
pub struct OwnedValue {
    engine: Engine,
    id: RawRef,
}

impl OwnedValue {
    /// Acquire a persistent reference to the slot's current value. This is
    /// the only way to keep a value past its stack frame.
    pub fn acquire(slot: &Slot<'_>) -> OwnedValue {
        let engine = slot.engine().clone();
        let id = engine.raw().acquire_ref(slot.index());
        OwnedValue { engine, id }
    }

    /// The engine this value lives in.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn raw_ref(&self) -> RawRef {
        self.id
    }

    /// Materialize the value onto the top of the current stack frame.
    pub fn push(&self) -> Slot<'_> {
        self.engine.raw().push_ref(self.id);
        Slot::new(&self.engine, self.engine.raw().top())
    }

    /// Dynamic kind of the referenced value.
    pub fn kind(&self) -> ValueKind {
        let _guard = self.engine.guard();
        self.push().kind()
    }

    /// Read the referenced value as native type `T`. The stack is restored
    /// afterwards.
    pub fn cast<T: FromSlot>(&self) -> BindResult<T> {
        let _guard = self.engine.guard();
        self.push().cast()
    }

    /// Defer this value into an unforced lazy chain base.
    pub fn lazy(&self) -> Lazy<'_> {
        Lazy::constant(&self.engine, Value::Handle(self.clone()))
    }

    /// Deferred index read, `self[key]`.
    pub fn get(&self, key: impl ToValue) -> Lazy<'_> {
        self.lazy().get(key)
    }

    /// View the referenced value as a table proxy.
    pub fn as_table(&self) -> Table<'_> {
        Table::new(self.lazy())
    }
}

impl Clone for OwnedValue {
    fn clone(&self) -> Self {
        let id = self.engine.raw().clone_ref(self.id);
        OwnedValue {
            engine: self.engine.clone(),
            id,
        }
    }
}

impl Drop for OwnedValue {
    fn drop(&mut self) {
        self.engine.raw().release_ref(self.id);
    }
}

impl fmt::Debug for OwnedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnedValue(#{})", self.id)
    }
}
