//! Deferred operations against engine values.
//!
//! A [`Lazy`] describes an operation (a constant, a stack slot, a table
//! index or a call) without performing it. Chains compose without touching
//! the engine (`t.get("a").get("b").call((x,))` is three nodes and zero
//! engine operations); only forcing the chain evaluates it, base first,
//! keys and arguments left to right.
//!
//! Forcing is not memoized. Re-forcing a chain re-executes every node,
//! which for pure index reads only repeats lookups but for calls repeats
//! the call and its side effects; hold the result (or a
//! [`persist`](Lazy::persist)ed handle) instead of forcing twice when the
//! chain ends in a call.
//!
//! [`force`](Lazy::force) leaves intermediate values on the stack (the
//! result slot is the top); [`cast`](Lazy::cast) and
//! [`persist`](Lazy::persist) evaluate under a stack guard and restore the
//! stack even when a node fails.

use crate::convert::{FromSlot, ToValue, ToValues};
use crate::engine::Engine;
use crate::error::{BindError, BindResult};
use crate::owned::OwnedValue;
use crate::slot::Slot;
use crate::table::index_key;
use crate::types::Value;

/// A deferred operation chain against a base value.
#[derive(Clone)]
pub struct Lazy<'e> {
    engine: &'e Engine,
    op: LazyOp<'e>,
}

#[derive(Clone)]
enum LazyOp<'e> {
    /// A materialized value, pushed on force.
    Const(Value),
    /// An existing live slot; forcing is free.
    Slot(Slot<'e>),
    /// `base[key]`.
    Index { base: Box<Lazy<'e>>, key: Value },
    /// `base(args...)`, adjusted to one result when forced as a value.
    Call {
        base: Box<Lazy<'e>>,
        args: Vec<Value>,
    },
}

impl<'e> Lazy<'e> {
    pub(crate) fn constant(engine: &'e Engine, v: Value) -> Self {
        Lazy {
            engine,
            op: LazyOp::Const(v),
        }
    }

    /// Defer over an existing live slot.
    pub fn from_slot(slot: Slot<'e>) -> Self {
        Lazy {
            engine: slot.engine(),
            op: LazyOp::Slot(slot),
        }
    }

    /// The engine this chain will evaluate against.
    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// Chain a deferred index read, `self[key]`.
    ///
    /// The key is converted to a [`Value`] now (no engine interaction) and
    /// pushed when the chain is forced.
    pub fn get(self, key: impl ToValue) -> Lazy<'e> {
        let engine = self.engine;
        Lazy {
            engine,
            op: LazyOp::Index {
                base: Box::new(self),
                key: key.to_value(),
            },
        }
    }

    /// Chain a deferred call, `self(args...)`.
    ///
    /// When forced as a value the call is adjusted to a single result; use
    /// [`invoke`](Lazy::invoke) to keep all results.
    pub fn call(self, args: impl ToValues) -> Lazy<'e> {
        let engine = self.engine;
        Lazy {
            engine,
            op: LazyOp::Call {
                base: Box::new(self),
                args: args.to_values(),
            },
        }
    }

    /// Evaluate the chain, yielding the slot holding its result.
    ///
    /// Each node performs exactly one engine-level operation, base before
    /// key/arguments. Intermediate values stay on the stack below the
    /// result; callers that only need a native value should use
    /// [`cast`](Lazy::cast), which cleans up.
    pub fn force(&self) -> BindResult<Slot<'e>> {
        match &self.op {
            LazyOp::Const(v) => Ok(self.engine.push_value(v.clone())),
            LazyOp::Slot(slot) => Ok(*slot),
            LazyOp::Index { base, key } => {
                let base_slot = base.force()?;
                self.engine.push_value(index_key(key.clone()));
                self.engine
                    .raw()
                    .table_get(base_slot.index())
                    .map_err(|_| self.engine.take_fault())?;
                Ok(Slot::new(self.engine, self.engine.raw().top()))
            }
            LazyOp::Call { base, args } => {
                let pushed = run_call(self.engine, base, args, Some(1))?;
                debug_assert_eq!(pushed, 1);
                Ok(Slot::new(self.engine, self.engine.raw().top()))
            }
        }
    }

    /// Evaluate the chain and convert its result to `T`, restoring the
    /// stack afterwards (also on failure).
    pub fn cast<T: FromSlot>(&self) -> BindResult<T> {
        let _guard = self.engine.guard();
        let slot = self.force()?;
        slot.cast()
    }

    /// Evaluate the chain and keep its result past the current frame.
    pub fn persist(&self) -> BindResult<OwnedValue> {
        let _guard = self.engine.guard();
        let slot = self.force()?;
        Ok(slot.persist())
    }

    /// Call the chain's value with `args`, keeping every result.
    ///
    /// Unlike [`call`](Lazy::call)+[`force`](Lazy::force) this does not
    /// adjust the result count; the engine's own adjustment rules apply
    /// only to the requested window. Dropping the returned [`ResultSet`]
    /// restores the stack.
    pub fn invoke(&self, args: impl ToValues) -> BindResult<ResultSet<'e>> {
        let mark = self.engine.raw().top();
        match run_call(self.engine, self, &args.to_values(), None) {
            Ok(count) => Ok(ResultSet {
                engine: self.engine,
                first: self.engine.raw().top() - count + 1,
                count,
                mark,
            }),
            Err(err) => {
                self.engine.raw().set_top(mark);
                Err(err)
            }
        }
    }
}

/// Force `base`, copy it to the top as the callee, push the arguments and
/// issue the protected call. Returns the number of results pushed.
fn run_call(
    engine: &Engine,
    base: &Lazy<'_>,
    args: &[Value],
    nresults: Option<u32>,
) -> BindResult<u32> {
    let callee = base.force()?;
    engine.raw().push_copy(callee.index());
    for arg in args {
        engine.push_value(arg.clone());
    }
    engine
        .raw()
        .protected_call(engine, args.len() as u32, nresults)
        .map_err(|_| engine.take_fault())
}

impl std::fmt::Debug for Lazy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.op {
            LazyOp::Const(v) => f.debug_tuple("Lazy::Const").field(v).finish(),
            LazyOp::Slot(s) => f.debug_tuple("Lazy::Slot").field(&s.index()).finish(),
            LazyOp::Index { base, key } => f
                .debug_struct("Lazy::Index")
                .field("base", base)
                .field("key", key)
                .finish(),
            LazyOp::Call { base, args } => f
                .debug_struct("Lazy::Call")
                .field("base", base)
                .field("args", &args.len())
                .finish(),
        }
    }
}

/// Ordered sequence of results from an unadjusted call.
///
/// The results live on the stack; slots handed out borrow from the set, and
/// dropping the set restores the stack to its pre-call depth.
pub struct ResultSet<'e> {
    engine: &'e Engine,
    first: u32,
    count: u32,
    mark: u32,
}

impl ResultSet<'_> {
    /// Number of results the call produced.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether the call produced no results.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The `i`-th result slot (zero-based).
    pub fn get(&self, i: usize) -> Option<Slot<'_>> {
        if i < self.count as usize {
            Some(Slot::new(self.engine, self.first + i as u32))
        } else {
            None
        }
    }

    /// Convert the `i`-th result; out of range reports
    /// [`ArityMismatch`](BindError::ArityMismatch).
    pub fn cast<T: FromSlot>(&self, i: usize) -> BindResult<T> {
        self.get(i)
            .ok_or(BindError::ArityMismatch {
                index: i,
                supplied: self.count as usize,
            })?
            .cast()
    }

    /// Iterate the result slots in order.
    pub fn iter(&self) -> impl Iterator<Item = Slot<'_>> {
        (0..self.count as usize).filter_map(|i| self.get(i))
    }
}

impl Drop for ResultSet<'_> {
    fn drop(&mut self) {
        if self.engine.raw().top() > self.mark {
            self.engine.raw().set_top(self.mark);
        }
    }
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("count", &self.count)
            .finish()
    }
}
