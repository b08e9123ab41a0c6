//! Dynamic value kinds and the engine-pushable constant value type.
//!
//! [`ValueKind`] mirrors the engine's dynamic type tags. [`KindSet`] is a
//! bitmask over kinds, used to report which kinds a conversion would have
//! accepted. [`Value`] is a fully materialized, engine-independent value:
//! constructing one never touches the engine, pushing one does.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::owned::OwnedValue;
use crate::raw::RawNativeFn;

/// Dynamic type tag of one engine value.
///
/// The discriminants are the raw `i32` tags of the engine protocol; FFI
/// shims implementing [`RawEngine`](crate::raw::RawEngine) over a C engine
/// can map the engine's own tags with `ValueKind::try_from(tag)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ValueKind {
    /// The absent value.
    Nil = 0,
    /// Boolean.
    Bool = 1,
    /// Integer number (protocol revision 53 and later).
    Int = 2,
    /// Floating-point number.
    Float = 3,
    /// Immutable string. The engine owns the backing buffer.
    Str = 4,
    /// Associative container.
    Table = 5,
    /// Callable value.
    Function = 6,
    /// Extension-type instance tagged with a class name.
    Userdata = 7,
}

impl ValueKind {
    /// Protocol name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "boolean",
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Table => "table",
            ValueKind::Function => "function",
            ValueKind::Userdata => "userdata",
        }
    }

    /// Singleton [`KindSet`] containing only this kind.
    pub fn mask(self) -> KindSet {
        match self {
            ValueKind::Nil => KindSet::NIL,
            ValueKind::Bool => KindSet::BOOL,
            ValueKind::Int => KindSet::INT,
            ValueKind::Float => KindSet::FLOAT,
            ValueKind::Str => KindSet::STR,
            ValueKind::Table => KindSet::TABLE,
            ValueKind::Function => KindSet::FUNCTION,
            ValueKind::Userdata => KindSet::USERDATA,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of value kinds, carried by type-mismatch errors to describe what
    /// a conversion would have accepted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KindSet: u32 {
        const NIL = 1 << 0;
        const BOOL = 1 << 1;
        const INT = 1 << 2;
        const FLOAT = 1 << 3;
        const STR = 1 << 4;
        const TABLE = 1 << 5;
        const FUNCTION = 1 << 6;
        const USERDATA = 1 << 7;
        /// Either numeric kind.
        const NUMBER = Self::INT.bits() | Self::FLOAT.bits();
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing");
        }
        if *self == KindSet::NUMBER {
            return f.write_str("number");
        }
        let mut first = true;
        for kind in [
            ValueKind::Nil,
            ValueKind::Bool,
            ValueKind::Int,
            ValueKind::Float,
            ValueKind::Str,
            ValueKind::Table,
            ValueKind::Function,
            ValueKind::Userdata,
        ] {
            if self.contains(kind.mask()) {
                if !first {
                    f.write_str(" or ")?;
                }
                f.write_str(kind.name())?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A materialized value that can be pushed onto the engine stack.
///
/// `Value` is the "constant" leaf of the lazy-operation layer: lazy index
/// keys and call arguments are held in this form until the chain is forced.
/// Building a `Value` from native data performs no engine interaction.
///
/// Engine-side aggregates (tables, functions) are represented by a
/// persistent-reference [`Handle`](Value::Handle), so a snapshotted `Value`
/// keeps them alive without pinning a stack slot.
#[derive(Clone)]
pub enum Value {
    /// The absent value.
    Nil,
    /// Boolean.
    Bool(bool),
    /// Integer number.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// String (owned copy on the native side).
    Str(String),
    /// Persistent reference to an engine-side value.
    Handle(OwnedValue),
    /// Wrapped native function in the engine's call convention.
    Native(RawNativeFn),
    /// Extension-type instance.
    User {
        /// The instance, shared by reference count.
        data: Rc<dyn Any>,
        /// Registered class name of the instance's native type.
        class: &'static str,
    },
}

impl Value {
    /// The dynamic kind this value will have once pushed.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Handle(h) => h.kind(),
            Value::Native(_) => ValueKind::Function,
            Value::User { .. } => ValueKind::Userdata,
        }
    }

    /// Whether this is the absent value.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Value::Handle(h) => f.debug_tuple("Handle").field(h).finish(),
            Value::Native(_) => f.write_str("Native(..)"),
            Value::User { class, .. } => f.debug_struct("User").field("class", class).finish(),
        }
    }
}

/// Renders the value the way the engine would in an error message.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::Handle(h) => write!(f, "<{}>", h.kind().name()),
            Value::Native(_) => f.write_str("<function>"),
            Value::User { class, .. } => write!(f, "<{class}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_raw_tag() {
        for kind in [
            ValueKind::Nil,
            ValueKind::Bool,
            ValueKind::Int,
            ValueKind::Float,
            ValueKind::Str,
            ValueKind::Table,
            ValueKind::Function,
            ValueKind::Userdata,
        ] {
            let tag: i32 = kind.into();
            assert_eq!(ValueKind::try_from(tag).unwrap(), kind);
        }
        assert!(ValueKind::try_from(42).is_err());
    }

    #[test]
    fn kind_set_display() {
        assert_eq!(KindSet::NUMBER.to_string(), "number");
        assert_eq!(KindSet::BOOL.to_string(), "boolean");
        assert_eq!(
            (KindSet::STR | KindSet::NIL).to_string(),
            "nil or string"
        );
        assert_eq!(KindSet::empty().to_string(), "nothing");
    }

    #[test]
    fn value_display_matches_engine_rendering() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Str("boom".into()).to_string(), "boom");
    }
}
