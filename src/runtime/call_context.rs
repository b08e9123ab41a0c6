//! The view a native function gets of its call frame.
//!
//! A [`CallContext`] scopes one native invocation: the incoming arguments of
//! the frame and the outgoing results pushed so far. Argument extraction
//! consults the process-wide [registry](crate::registry) first, then the
//! type's own [`FromSlot`] implementation; return packing mirrors that
//! through [`ret`](CallContext::ret). A frame with too few arguments reports
//! [`ArityMismatch`](BindError::ArityMismatch) before the function body runs
//! any engine operation on the missing slot.

use std::any::Any;
use std::fmt;

use crate::convert::{FromSlot, ToReturn, ToValue};
use crate::engine::Engine;
use crate::error::{BindError, BindResult};
use crate::registry;
use crate::slot::Slot;

/// Frame view handed to a native function for the duration of one call.
pub struct CallContext<'e> {
    engine: &'e Engine,
    base: u32,
    argc: u32,
    results: u32,
}

impl<'e> CallContext<'e> {
    /// Build the context for the frame currently executing. Arguments are
    /// everything above the engine's frame base at entry.
    pub(crate) fn new(engine: &'e Engine) -> Self {
        let base = engine.raw().frame_base();
        let argc = engine.raw().top() - base;
        CallContext {
            engine,
            base,
            argc,
            results: 0,
        }
    }

    /// The engine this call runs in.
    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// Number of arguments the caller supplied.
    pub fn arity(&self) -> usize {
        self.argc as usize
    }

    /// The slot of argument `i` (zero-based).
    pub fn arg_slot(&self, i: usize) -> BindResult<Slot<'e>> {
        if i < self.argc as usize {
            Ok(Slot::new(self.engine, self.base + 1 + i as u32))
        } else {
            Err(BindError::ArityMismatch {
                index: i,
                supplied: self.argc as usize,
            })
        }
    }

    /// Extract argument `i` as native type `T`.
    ///
    /// A custom converter registered for `T` wins over `T`'s own `FromSlot`.
    pub fn arg<T: FromSlot + 'static>(&self, i: usize) -> BindResult<T> {
        let slot = self.arg_slot(i)?;
        match registry::convert_arg::<T>(&slot) {
            Some(result) => result,
            None => slot.cast(),
        }
    }

    /// Extract argument `i` through the registry only.
    ///
    /// For foreign types without a `FromSlot` implementation; reports
    /// [`NoConverter`](BindError::NoConverter) when nothing is registered.
    pub fn arg_registered<T: 'static>(&self, i: usize) -> BindResult<T> {
        let slot = self.arg_slot(i)?;
        registry::convert_arg::<T>(&slot).ok_or(BindError::NoConverter {
            type_name: std::any::type_name::<T>(),
        })?
    }

    /// Push one outgoing result through the default conversion path.
    pub fn push_result(&mut self, v: impl ToValue) {
        self.engine.push_value(v.to_value());
        self.results += 1;
    }

    /// Push one outgoing result, honoring a registered return converter for
    /// `T` over the default path.
    pub fn ret_value<T: ToValue + Any>(&mut self, v: T) -> BindResult<()> {
        match registry::ret_converter::<T>() {
            Some(cvt) => {
                cvt(Box::new(v), self)?;
                Ok(())
            }
            None => {
                self.push_result(v);
                Ok(())
            }
        }
    }

    /// Push one outgoing result through the registry only.
    ///
    /// For foreign types without a `ToValue` implementation; reports
    /// [`NoConverter`](BindError::NoConverter) when nothing is registered.
    pub fn ret_registered<T: Any>(&mut self, v: T) -> BindResult<()> {
        match registry::ret_converter::<T>() {
            Some(cvt) => {
                cvt(Box::new(v), self)?;
                Ok(())
            }
            None => Err(BindError::NoConverter {
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    /// Pack a full return value and finish the frame.
    pub fn ret<T: ToReturn>(&mut self, v: T) -> BindResult<Retval> {
        v.to_return(self)
    }

    /// Finish the frame with the results pushed so far.
    pub fn done(&self) -> Retval {
        Retval {
            count: self.results,
        }
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("arity", &self.argc)
            .field("results", &self.results)
            .finish()
    }
}

/// Proof that a native function produced its results through a
/// [`CallContext`]. Opaque; obtained from [`CallContext::done`] or
/// [`CallContext::ret`].
#[derive(Debug)]
pub struct Retval {
    count: u32,
}

impl Retval {
    pub(crate) fn count(&self) -> u32 {
        self.count
    }
}
