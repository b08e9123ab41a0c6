//! Table and entry proxies.
//!
//! A [`Table`] wraps a lazy chain whose result is expected to be a table.
//! Reads through it stay deferred (they extend the chain); writes are
//! eager, because an unobserved write is a lost write. An [`Entry`] pins
//! one key of a table for repeated access.
//!
//! ## Index keys
//!
//! Engine tables keep integer and float keys distinct at the raw level. In
//! an indexing position this layer normalizes float keys with an integral
//! value to integers, so `t.get(2.0)` and `t.get(2)` address the same
//! entry. The `strict-index` feature disables the normalization and passes
//! keys through untouched.

use crate::config;
use crate::convert::{FromSlot, ToValue};
use crate::engine::Engine;
use crate::error::BindResult;
use crate::lazy::Lazy;
use crate::slot::Slot;
use crate::types::Value;

/// Normalize a value for use as a table key in an indexing position.
pub(crate) fn index_key(key: Value) -> Value {
    if config::STRICT_INDEX {
        return key;
    }
    match key {
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() && in_int_range(f) => {
            Value::Int(f as i64)
        }
        other => other,
    }
}

fn in_int_range(f: f64) -> bool {
    f >= -(2f64.powi(63)) && f < 2f64.powi(63)
}

/// Proxy over a table-valued lazy chain.
#[derive(Clone, Debug)]
pub struct Table<'e> {
    base: Lazy<'e>,
}

impl<'e> Table<'e> {
    pub(crate) fn new(base: Lazy<'e>) -> Self {
        Table { base }
    }

    /// View a live slot as a table.
    pub fn from_slot(slot: Slot<'e>) -> Self {
        Table {
            base: Lazy::from_slot(slot),
        }
    }

    /// The engine this table lives in.
    pub fn engine(&self) -> &'e Engine {
        self.base.engine()
    }

    /// The underlying lazy chain (unforced).
    pub fn lazy(&self) -> Lazy<'e> {
        self.base.clone()
    }

    /// Deferred read of `self[key]`. Nothing touches the engine until the
    /// returned chain is forced.
    pub fn get(&self, key: impl ToValue) -> Lazy<'e> {
        self.base.clone().get(key)
    }

    /// Eager write of `self[key] = value`.
    ///
    /// The table chain is forced, the write is performed immediately, and
    /// the stack is restored. Writing `Nil` removes the entry.
    pub fn set(&self, key: impl ToValue, value: impl ToValue) -> BindResult<()> {
        let engine = self.base.engine();
        let _guard = engine.guard();
        let table = self.base.force()?;
        engine.push_value(index_key(key.to_value()));
        engine.push_value(value.to_value());
        engine
            .raw()
            .table_set(table.index())
            .map_err(|_| engine.take_fault())
    }

    /// Pin one key for repeated reads and writes.
    pub fn entry(&self, key: impl ToValue) -> Entry<'e> {
        Entry {
            table: self.clone(),
            key: key.to_value(),
        }
    }
}

/// One key of a [`Table`], usable for both reads and writes.
#[derive(Clone, Debug)]
pub struct Entry<'e> {
    table: Table<'e>,
    key: Value,
}

impl<'e> Entry<'e> {
    /// Deferred read of the entry as a chain.
    pub fn lazy(&self) -> Lazy<'e> {
        self.table.get(self.key.clone())
    }

    /// Read the entry as native type `T`.
    pub fn get<T: FromSlot>(&self) -> BindResult<T> {
        self.lazy().cast()
    }

    /// Eager write of the entry.
    pub fn set(&self, value: impl ToValue) -> BindResult<()> {
        self.table.set(self.key.clone(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let engine = Engine::mock();
        let t = engine.create_table();
        t.set("answer", 42i64).unwrap();
        assert_eq!(t.get("answer").cast::<i64>().unwrap(), 42);
    }

    #[test]
    fn set_restores_stack() {
        let engine = Engine::mock();
        let t = engine.create_table();
        let before = engine.top();
        t.set("k", "v").unwrap();
        assert_eq!(engine.top(), before);
    }

    #[test]
    fn absent_key_reads_nil() {
        let engine = Engine::mock();
        let t = engine.create_table();
        assert_eq!(t.get("missing").cast::<Option<i64>>().unwrap(), None);
    }

    #[test]
    fn nil_write_removes_entry() {
        let engine = Engine::mock();
        let t = engine.create_table();
        t.set("k", 1i64).unwrap();
        t.set("k", ()).unwrap();
        assert_eq!(t.get("k").cast::<Option<i64>>().unwrap(), None);
    }

    #[cfg(not(feature = "strict-index"))]
    #[test]
    fn integral_float_key_addresses_integer_entry() {
        let engine = Engine::mock();
        let t = engine.create_table();
        t.set(2i64, "two").unwrap();
        assert_eq!(t.get(2.0f64).cast::<String>().unwrap(), "two");
        t.set(3.0f64, "three").unwrap();
        assert_eq!(t.get(3i64).cast::<String>().unwrap(), "three");
    }

    #[cfg(feature = "strict-index")]
    #[test]
    fn float_key_stays_distinct_under_strict_index() {
        let engine = Engine::mock();
        let t = engine.create_table();
        t.set(2i64, "two").unwrap();
        assert_eq!(t.get(2.0f64).cast::<Option<String>>().unwrap(), None);
    }

    #[test]
    fn fractional_float_key_is_never_normalized() {
        let engine = Engine::mock();
        let t = engine.create_table();
        t.set(2.5f64, "half").unwrap();
        assert_eq!(t.get(2.5f64).cast::<String>().unwrap(), "half");
        assert_eq!(t.get(2i64).cast::<Option<String>>().unwrap(), None);
    }

    #[test]
    fn entry_pins_key() {
        let engine = Engine::mock();
        let t = engine.create_table();
        let e = t.entry("hp");
        e.set(100i64).unwrap();
        assert_eq!(e.get::<i64>().unwrap(), 100);
        e.set(75i64).unwrap();
        assert_eq!(e.get::<i64>().unwrap(), 75);
    }

    #[test]
    fn nested_table_chain() {
        let engine = Engine::mock();
        let outer = engine.create_table();
        let inner = engine.create_table();
        inner.set("x", 7i64).unwrap();
        outer.set("inner", inner.lazy().persist().unwrap()).unwrap();
        assert_eq!(
            outer.get("inner").get("x").cast::<i64>().unwrap(),
            7
        );
    }

    #[test]
    fn indexing_non_table_faults() {
        use crate::error::BindError;
        let engine = Engine::mock();
        let slot = engine.push(5i64);
        let err = Lazy::from_slot(slot).get("k").cast::<i64>().unwrap_err();
        assert!(matches!(err, BindError::Call(_)));
    }
}
