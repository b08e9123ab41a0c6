//! Non-owning references to live stack slots.
//!
//! A [`Slot`] is a position descriptor, not a value: it stays valid exactly
//! as long as the stack frame that produced it. That contract is enforced by
//! lifetime scoping and, in debug builds, by an assertion that the position
//! is still inside the live stack; release builds perform no checks, so
//! using a slot after its frame unwound is undefined. This is the
//! stack-discipline precondition described in [`error`](crate::error).

use std::fmt;

use crate::convert::{FromSlot, ToValue};
use crate::engine::Engine;
use crate::error::BindResult;
use crate::owned::OwnedValue;
use crate::types::{Value, ValueKind};

/// Lightweight reference to one live slot in the engine's value stack.
#[derive(Clone, Copy)]
pub struct Slot<'e> {
    engine: &'e Engine,
    index: u32,
}

impl<'e> Slot<'e> {
    pub(crate) fn new(engine: &'e Engine, index: u32) -> Self {
        let slot = Slot { engine, index };
        slot.check();
        slot
    }

    #[inline]
    fn check(&self) {
        debug_assert!(
            self.index >= 1 && self.index <= self.engine.raw().top(),
            "stack slot {} used outside its live frame (top is {})",
            self.index,
            self.engine.raw().top(),
        );
    }

    /// Absolute 1-based stack position.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The engine this slot lives in.
    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// Dynamic kind of the value currently in the slot.
    pub fn kind(&self) -> ValueKind {
        self.check();
        self.engine.raw().kind(self.index)
    }

    /// Read the slot as native type `T`.
    pub fn cast<T: FromSlot>(&self) -> BindResult<T> {
        self.check();
        T::from_slot(self)
    }

    /// Write a native value into this slot's position.
    pub fn assign(&self, v: impl ToValue) {
        self.check();
        self.engine.push_value(v.to_value());
        self.engine.raw().replace(self.index);
    }

    /// Keep the slot's current value alive past this stack frame.
    pub fn persist(&self) -> OwnedValue {
        OwnedValue::acquire(self)
    }

    /// Materialize the slot's value as an engine-independent [`Value`].
    ///
    /// Scalars are copied out; tables, functions and userdata become
    /// persistent-reference handles (or shared instances), so the snapshot
    /// never dangles.
    pub fn snapshot(&self) -> BindResult<Value> {
        use crate::error::BindError;
        use crate::types::KindSet;

        self.check();
        let raw = self.engine.raw();
        let missing = |kind: ValueKind| BindError::mismatch(kind.mask(), ValueKind::Nil);
        Ok(match self.kind() {
            ValueKind::Nil => Value::Nil,
            ValueKind::Bool => Value::Bool(
                raw.read_bool(self.index)
                    .ok_or_else(|| missing(ValueKind::Bool))?,
            ),
            ValueKind::Int => Value::Int(
                raw.read_int(self.index)
                    .ok_or_else(|| missing(ValueKind::Int))?,
            ),
            ValueKind::Float => Value::Float(
                raw.read_float(self.index)
                    .ok_or_else(|| missing(ValueKind::Float))?,
            ),
            ValueKind::Str => Value::Str(
                raw.read_str(self.index)
                    .ok_or_else(|| missing(ValueKind::Str))?,
            ),
            ValueKind::Table | ValueKind::Function => Value::Handle(self.persist()),
            ValueKind::Userdata => {
                let data = self
                    .engine
                    .raw()
                    .read_userdata(self.index)
                    .ok_or(BindError::TypeMismatch {
                        expected: KindSet::USERDATA,
                        actual: ValueKind::Nil,
                    })?;
                let class = self
                    .engine
                    .raw()
                    .userdata_class(self.index)
                    .unwrap_or("userdata");
                Value::User { data, class }
            }
        })
    }
}

impl fmt::Debug for Slot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index)
            .field("kind", &self.engine.raw().kind(self.index))
            .finish()
    }
}
