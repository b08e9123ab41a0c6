//! In-memory implementation of the engine boundary.
//!
//! [`MockEngine`] is a plain value store with the shape of a real engine:
//! one stack, table values with shared identity, protected calls over
//! native functions, and a persistent-reference registry with engine-side
//! reference counts. It exists so the binding (and downstream embedders'
//! own bindings) can be exercised without linking a scripting engine; it
//! deliberately has no language, no compiler and no collector beyond `Rc`.
//!
//! The mock is a *raw* store: it does not normalize numeric table keys.
//! Index-context normalization (integral float keys becoming integer keys)
//! is the binding's concern, so the `strict-index` feature stays observable
//! against the mock.
//!
//! [`op_count`](MockEngine::op_count) counts engine-level operations
//! (table gets/sets and protected calls), which the test suite uses to
//! verify that lazy chains touch the engine exactly once per node and not
//! at all before being forced.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use super::{RawEngine, RawFault, RawNativeFn, RawRef};
use crate::engine::Engine;
use crate::types::ValueKind;

type TableStore = Rc<RefCell<FxHashMap<MockKey, MockValue>>>;

/// One stored value.
#[derive(Clone)]
enum MockValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Table(TableStore),
    Function(RawNativeFn),
    User(Rc<dyn Any>, &'static str),
}

impl MockValue {
    fn kind(&self) -> ValueKind {
        match self {
            MockValue::Nil => ValueKind::Nil,
            MockValue::Bool(_) => ValueKind::Bool,
            MockValue::Int(_) => ValueKind::Int,
            MockValue::Float(_) => ValueKind::Float,
            MockValue::Str(_) => ValueKind::Str,
            MockValue::Table(_) => ValueKind::Table,
            MockValue::Function(_) => ValueKind::Function,
            MockValue::User(..) => ValueKind::Userdata,
        }
    }
}

/// Table key form. Floats are hashable via `OrderedFloat`; nil and NaN keys
/// are faulted before reaching this type.
#[derive(Clone, PartialEq, Eq, Hash)]
enum MockKey {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Rc<str>),
    /// Identity key for non-scalar values.
    Id(usize),
}

/// In-memory engine used for testing bindings.
#[derive(Default)]
pub struct MockEngine {
    stack: RefCell<Vec<MockValue>>,
    refs: RefCell<FxHashMap<RawRef, (MockValue, u32)>>,
    next_ref: Cell<RawRef>,
    /// Frame bases of native calls currently on the stack.
    frames: RefCell<Vec<u32>>,
    ops: Cell<u64>,
}

impl MockEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        MockEngine::default()
    }

    /// Number of engine-level operations performed so far (table gets and
    /// sets, protected calls).
    pub fn op_count(&self) -> u64 {
        self.ops.get()
    }

    fn bump(&self) {
        self.ops.set(self.ops.get() + 1);
    }

    fn value_at(&self, index: u32) -> Option<MockValue> {
        let stack = self.stack.borrow();
        if index == 0 || index as usize > stack.len() {
            return None;
        }
        Some(stack[index as usize - 1].clone())
    }

    fn push_value(&self, v: MockValue) {
        self.stack.borrow_mut().push(v);
    }

    fn pop_value(&self) -> MockValue {
        self.stack.borrow_mut().pop().unwrap_or(MockValue::Nil)
    }

    /// Push an error message and signal the fault.
    fn fault(&self, message: String) -> RawFault {
        self.push_value(MockValue::Str(message.into()));
        RawFault
    }

    fn key_of(&self, v: MockValue) -> Result<MockKey, RawFault> {
        match v {
            MockValue::Nil => Err(self.fault("table index is nil".into())),
            MockValue::Bool(b) => Ok(MockKey::Bool(b)),
            MockValue::Int(i) => Ok(MockKey::Int(i)),
            MockValue::Float(f) if f.is_nan() => Err(self.fault("table index is NaN".into())),
            MockValue::Float(f) => Ok(MockKey::Float(OrderedFloat(f))),
            MockValue::Str(s) => Ok(MockKey::Str(s)),
            MockValue::Table(t) => Ok(MockKey::Id(Rc::as_ptr(&t) as *const () as usize)),
            MockValue::Function(f) => Ok(MockKey::Id(Rc::as_ptr(&f) as *const () as usize)),
            MockValue::User(d, _) => Ok(MockKey::Id(Rc::as_ptr(&d) as *const () as usize)),
        }
    }

    fn table_at(&self, index: u32, verb: &str) -> Result<TableStore, RawFault> {
        match self.value_at(index) {
            Some(MockValue::Table(t)) => Ok(t),
            Some(other) => Err(self.fault(format!("attempt to {verb} a {} value", other.kind().name()))),
            None => Err(self.fault(format!("attempt to {verb} a missing stack slot"))),
        }
    }
}

impl RawEngine for MockEngine {
    fn top(&self) -> u32 {
        self.stack.borrow().len() as u32
    }

    fn set_top(&self, n: u32) {
        let mut stack = self.stack.borrow_mut();
        let n = n as usize;
        if n <= stack.len() {
            stack.truncate(n);
        } else {
            stack.resize(n, MockValue::Nil);
        }
    }

    fn pop(&self, n: u32) {
        let mut stack = self.stack.borrow_mut();
        let len = stack.len().saturating_sub(n as usize);
        stack.truncate(len);
    }

    fn kind(&self, index: u32) -> ValueKind {
        self.value_at(index).map_or(ValueKind::Nil, |v| v.kind())
    }

    fn push_nil(&self) {
        self.push_value(MockValue::Nil);
    }

    fn push_bool(&self, v: bool) {
        self.push_value(MockValue::Bool(v));
    }

    fn push_int(&self, v: i64) {
        self.push_value(MockValue::Int(v));
    }

    fn push_float(&self, v: f64) {
        self.push_value(MockValue::Float(v));
    }

    fn push_str(&self, v: &str) {
        self.push_value(MockValue::Str(v.into()));
    }

    fn push_copy(&self, index: u32) {
        let v = self.value_at(index).unwrap_or(MockValue::Nil);
        self.push_value(v);
    }

    fn replace(&self, index: u32) {
        let top = self.pop_value();
        let mut stack = self.stack.borrow_mut();
        let idx = index as usize;
        if idx >= 1 && idx <= stack.len() {
            stack[idx - 1] = top;
        }
    }

    fn read_bool(&self, index: u32) -> Option<bool> {
        match self.value_at(index)? {
            MockValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn read_int(&self, index: u32) -> Option<i64> {
        match self.value_at(index)? {
            MockValue::Int(v) => Some(v),
            _ => None,
        }
    }

    fn read_float(&self, index: u32) -> Option<f64> {
        match self.value_at(index)? {
            MockValue::Float(v) => Some(v),
            _ => None,
        }
    }

    fn read_str(&self, index: u32) -> Option<String> {
        match self.value_at(index)? {
            MockValue::Str(v) => Some(v.to_string()),
            _ => None,
        }
    }

    fn create_table(&self) {
        self.push_value(MockValue::Table(Rc::new(RefCell::new(FxHashMap::default()))));
    }

    fn table_get(&self, table: u32) -> Result<(), RawFault> {
        self.bump();
        let key = self.pop_value();
        let store = self.table_at(table, "index")?;
        let key = self.key_of(key)?;
        let value = store.borrow().get(&key).cloned().unwrap_or(MockValue::Nil);
        self.push_value(value);
        Ok(())
    }

    fn table_set(&self, table: u32) -> Result<(), RawFault> {
        self.bump();
        let value = self.pop_value();
        let key = self.pop_value();
        let store = self.table_at(table, "index")?;
        let key = self.key_of(key)?;
        if matches!(value, MockValue::Nil) {
            store.borrow_mut().remove(&key);
        } else {
            store.borrow_mut().insert(key, value);
        }
        Ok(())
    }

    fn push_native(&self, f: RawNativeFn) {
        self.push_value(MockValue::Function(f));
    }

    fn frame_base(&self) -> u32 {
        self.frames.borrow().last().copied().unwrap_or(0)
    }

    fn protected_call(
        &self,
        engine: &Engine,
        nargs: u32,
        nresults: Option<u32>,
    ) -> Result<u32, RawFault> {
        self.bump();
        let top = self.top();
        if top < nargs + 1 {
            return Err(self.fault("not enough values on the stack for the call".into()));
        }
        let callee_pos = top - nargs;
        let callee = {
            // Remove the callee; arguments slide down onto the frame base.
            let mut stack = self.stack.borrow_mut();
            stack.remove(callee_pos as usize - 1)
        };
        let base = callee_pos - 1;
        let f = match callee {
            MockValue::Function(f) => f,
            other => {
                self.stack.borrow_mut().truncate(base as usize);
                return Err(self.fault(format!(
                    "attempt to call a {} value",
                    other.kind().name()
                )));
            }
        };

        self.frames.borrow_mut().push(base);
        let outcome = f(engine);
        self.frames.borrow_mut().pop();

        match outcome {
            Ok(n) => {
                let mut stack = self.stack.borrow_mut();
                let split = stack.len().saturating_sub(n as usize).max(base as usize);
                let mut results: Vec<MockValue> = stack.split_off(split);
                stack.truncate(base as usize);
                if let Some(want) = nresults {
                    results.resize(want as usize, MockValue::Nil);
                }
                let produced = results.len() as u32;
                stack.extend(results);
                Ok(produced)
            }
            Err(RawFault) => {
                let error = self.pop_value();
                self.stack.borrow_mut().truncate(base as usize);
                self.push_value(error);
                Err(RawFault)
            }
        }
    }

    fn acquire_ref(&self, index: u32) -> RawRef {
        let v = self.value_at(index).unwrap_or(MockValue::Nil);
        let id = self.next_ref.get() + 1;
        self.next_ref.set(id);
        self.refs.borrow_mut().insert(id, (v, 1));
        id
    }

    fn clone_ref(&self, r: RawRef) -> RawRef {
        let mut refs = self.refs.borrow_mut();
        let entry = refs
            .get_mut(&r)
            .expect("persistent reference cloned after release");
        entry.1 += 1;
        r
    }

    fn release_ref(&self, r: RawRef) {
        let mut refs = self.refs.borrow_mut();
        if let Some(entry) = refs.get_mut(&r) {
            entry.1 -= 1;
            if entry.1 == 0 {
                refs.remove(&r);
            }
        }
    }

    fn push_ref(&self, r: RawRef) {
        let v = {
            let refs = self.refs.borrow();
            refs.get(&r)
                .map(|(v, _)| v.clone())
                .expect("persistent reference used after release")
        };
        self.push_value(v);
    }

    fn push_userdata(&self, data: Rc<dyn Any>, class: &'static str) {
        self.push_value(MockValue::User(data, class));
    }

    fn userdata_class(&self, index: u32) -> Option<&'static str> {
        match self.value_at(index)? {
            MockValue::User(_, class) => Some(class),
            _ => None,
        }
    }

    fn read_userdata(&self, index: u32) -> Option<Rc<dyn Any>> {
        match self.value_at(index)? {
            MockValue::User(data, _) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_push_read_pop() {
        let vm = MockEngine::new();
        vm.push_int(7);
        vm.push_str("hi");
        assert_eq!(vm.top(), 2);
        assert_eq!(vm.kind(1), ValueKind::Int);
        assert_eq!(vm.read_str(2).as_deref(), Some("hi"));
        vm.pop(1);
        assert_eq!(vm.top(), 1);
        assert_eq!(vm.read_int(1), Some(7));
    }

    #[test]
    fn set_top_pads_with_nil() {
        let vm = MockEngine::new();
        vm.push_bool(true);
        vm.set_top(3);
        assert_eq!(vm.top(), 3);
        assert_eq!(vm.kind(3), ValueKind::Nil);
        vm.set_top(0);
        assert_eq!(vm.top(), 0);
    }

    #[test]
    fn table_get_missing_key_pushes_nil() {
        let vm = MockEngine::new();
        vm.create_table();
        vm.push_str("absent");
        vm.table_get(1).unwrap();
        assert_eq!(vm.kind(2), ValueKind::Nil);
    }

    #[test]
    fn table_set_then_get() {
        let vm = MockEngine::new();
        vm.create_table();
        vm.push_str("k");
        vm.push_int(9);
        vm.table_set(1).unwrap();
        vm.push_str("k");
        vm.table_get(1).unwrap();
        assert_eq!(vm.read_int(2), Some(9));
    }

    #[test]
    fn nil_table_key_faults_with_payload_on_top() {
        let vm = MockEngine::new();
        vm.create_table();
        vm.push_nil();
        vm.push_int(1);
        assert!(vm.table_set(1).is_err());
        assert_eq!(vm.read_str(vm.top()).as_deref(), Some("table index is nil"));
    }

    #[test]
    fn indexing_a_non_table_faults() {
        let vm = MockEngine::new();
        vm.push_int(5);
        vm.push_str("k");
        assert!(vm.table_get(1).is_err());
        assert!(
            vm.read_str(vm.top())
                .unwrap()
                .contains("attempt to index a integer value")
        );
    }

    #[test]
    fn refs_are_counted() {
        let vm = MockEngine::new();
        vm.push_int(11);
        let r = vm.acquire_ref(1);
        let r2 = vm.clone_ref(r);
        assert_eq!(r, r2);
        vm.release_ref(r);
        vm.push_ref(r2);
        assert_eq!(vm.read_int(vm.top()), Some(11));
        vm.release_ref(r2);
        assert!(vm.refs.borrow().is_empty());
    }

    #[test]
    fn float_keys_are_distinct_from_int_keys() {
        let vm = MockEngine::new();
        vm.create_table();
        vm.push_int(1);
        vm.push_str("int");
        vm.table_set(1).unwrap();
        vm.push_float(1.0);
        vm.table_get(1).unwrap();
        // Raw store: no key normalization, that is the binding's job.
        assert_eq!(vm.kind(2), ValueKind::Nil);
    }
}
