//! The engine boundary.
//!
//! The scripting engine is an external collaborator reached exclusively
//! through [`RawEngine`]: a small fixed set of primitive operations over the
//! engine's value stack, table containers, protected calls and persistent
//! references. Everything above this module (slots, conversions, lazy
//! chains, call contexts) is engine-agnostic.
//!
//! An FFI shim over a real engine implements `RawEngine` by forwarding each
//! primitive to the engine's C API (mapping raw type tags through
//! `ValueKind::try_from`). The bundled [`MockEngine`](mock::MockEngine) is an
//! in-memory implementation used by the test suite and by embedders testing
//! their own bindings without linking an engine.
//!
//! # Stack addressing
//!
//! Indices are 1-based absolute positions from the bottom of the stack;
//! index `top()` is the most recently pushed value. Positions become invalid
//! when their owning frame unwinds; the layers above enforce that by
//! scoping, not by runtime checks.

pub mod mock;

use std::any::Any;
use std::rc::Rc;

use crate::engine::Engine;
use crate::types::ValueKind;

/// Identifier of an engine-held persistent reference.
pub type RawRef = u32;

/// Marker for a failure raised through the engine's error mechanism.
///
/// Whenever a primitive returns `Err(RawFault)`, the engine has left the
/// error value on top of the stack; the caller owns popping it.
#[derive(Debug)]
pub struct RawFault;

/// The engine's fixed call convention for native functions.
///
/// The function runs over the current frame's argument window, pushes its
/// results in order and returns how many it pushed. Returning `Err` raises
/// an error inside the engine: the error value must already sit on the
/// stack top. The high-level [`Engine`] handle is passed back in so the
/// function can build slots and nested operations.
pub type RawNativeFn = Rc<dyn Fn(&Engine) -> Result<u32, RawFault>>;

/// Primitive operations of the embedded engine.
///
/// All methods take `&self`; implementations are expected to use interior
/// mutability, matching the single-threaded call/return discipline of the
/// engine itself. None of these methods are re-entrancy hazards except
/// [`protected_call`](RawEngine::protected_call), which may invoke native
/// functions that call back into the engine.
pub trait RawEngine {
    // ------------------------------------------------------------------
    // Stack
    // ------------------------------------------------------------------

    /// Current stack depth.
    fn top(&self) -> u32;

    /// Truncate the stack to `n` values, or pad with nil up to `n`.
    fn set_top(&self, n: u32);

    /// Pop `n` values.
    fn pop(&self, n: u32);

    /// Dynamic kind of the value at `index`.
    fn kind(&self, index: u32) -> ValueKind;

    /// Push the absent value.
    fn push_nil(&self);

    /// Push a boolean.
    fn push_bool(&self, v: bool);

    /// Push an integer.
    fn push_int(&self, v: i64);

    /// Push a float.
    fn push_float(&self, v: f64);

    /// Push a string (the engine copies the bytes).
    fn push_str(&self, v: &str);

    /// Push a copy of the value at `index`.
    fn push_copy(&self, index: u32);

    /// Pop the top value into position `index`.
    fn replace(&self, index: u32);

    // ------------------------------------------------------------------
    // Typed reads (exact kind, no coercion; coercion lives above)
    // ------------------------------------------------------------------

    /// Read a boolean slot.
    fn read_bool(&self, index: u32) -> Option<bool>;

    /// Read an integer slot.
    fn read_int(&self, index: u32) -> Option<i64>;

    /// Read a float slot.
    fn read_float(&self, index: u32) -> Option<f64>;

    /// Copy a string slot out of the engine. The engine owns its buffer;
    /// the copy is mandatory.
    fn read_str(&self, index: u32) -> Option<String>;

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Push a fresh empty table.
    fn create_table(&self);

    /// `push(t[k])` where `t` is at `table` and `k` is popped from the top.
    fn table_get(&self, table: u32) -> Result<(), RawFault>;

    /// `t[k] = v` where `t` is at `table` and `k`, `v` are popped from the
    /// top (value above key).
    fn table_set(&self, table: u32) -> Result<(), RawFault>;

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Push a native function value.
    fn push_native(&self, f: RawNativeFn);

    /// Base index of the current native call frame (0 at top level).
    /// Arguments of the running native function occupy
    /// `base + 1 ..= base + argc`.
    fn frame_base(&self) -> u32;

    /// Call the value below the top `nargs` values, consuming callee and
    /// arguments. On success the results are pushed in order, adjusted to
    /// `nresults` if given (`None` keeps them all; adjustment is the
    /// engine's own truncate-or-pad rule), and their count is returned.
    fn protected_call(
        &self,
        engine: &Engine,
        nargs: u32,
        nresults: Option<u32>,
    ) -> Result<u32, RawFault>;

    // ------------------------------------------------------------------
    // Persistent references
    // ------------------------------------------------------------------

    /// Acquire a persistent reference to the value at `index` (not popped).
    fn acquire_ref(&self, index: u32) -> RawRef;

    /// Increment the reference count behind `r`; returns the id to release.
    fn clone_ref(&self, r: RawRef) -> RawRef;

    /// Release one count of `r`. Exactly one release per acquisition/clone.
    fn release_ref(&self, r: RawRef);

    /// Push the value behind `r`.
    fn push_ref(&self, r: RawRef);

    // ------------------------------------------------------------------
    // Userdata
    // ------------------------------------------------------------------

    /// Push an extension-type instance tagged with `class`. The engine keeps
    /// its clone of the `Rc`; dropping it is the finalizer.
    fn push_userdata(&self, data: Rc<dyn Any>, class: &'static str);

    /// Class name of the userdata at `index`, if it is one.
    fn userdata_class(&self, index: u32) -> Option<&'static str>;

    /// Shared handle to the userdata instance at `index`.
    fn read_userdata(&self, index: u32) -> Option<Rc<dyn Any>>;
}
