//! Wrapping native Rust functions into engine-callable values.
//!
//! [`wrap`] turns an ordinary `Fn` of up to eight convertible arguments into
//! a [`Value::Native`]; the generated shim extracts every argument (all
//! extractions run before the body, so an arity or conversion failure never
//! executes a partially-argued body), invokes the function, packs the return
//! value and translates any failure into an error raised inside the engine.
//! Panics in the body are caught at the boundary and raised the same way,
//! so unwinding never crosses into the engine.
//!
//! [`wrap_raw`] is the escape hatch for variadic or introspective functions
//! that want the [`CallContext`] directly.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::convert::{FromSlot, ToReturn};
use crate::engine::Engine;
use crate::error::{BindError, BindResult};
use crate::raw::{RawFault, RawNativeFn};
use crate::runtime::{CallContext, Retval};
use crate::types::Value;

/// A native function callable from the engine with a typed argument list.
///
/// Implemented for closures and fn pointers of zero to eight arguments,
/// each argument [`FromSlot`] and the return type [`ToReturn`]. The `Args`
/// parameter is the tuple of argument types; it only disambiguates the
/// implementations and is inferred at the [`wrap`] call site.
pub trait NativeFunction<Args> {
    /// Run the function over the frame in `ctx`.
    fn invoke(&self, ctx: &mut CallContext<'_>) -> BindResult<Retval>;
}

macro_rules! impl_native_fn {
    ($(($name:ident, $idx:tt)),*) => {
        impl<F, R $(, $name)*> NativeFunction<($($name,)*)> for F
        where
            F: Fn($($name),*) -> R,
            R: ToReturn,
            $($name: FromSlot + 'static,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn invoke(&self, ctx: &mut CallContext<'_>) -> BindResult<Retval> {
                $(let $name = ctx.arg::<$name>($idx)?;)*
                (self)($($name),*).to_return(ctx)
            }
        }
    };
}

impl_native_fn!();
impl_native_fn!((A, 0));
impl_native_fn!((A, 0), (B, 1));
impl_native_fn!((A, 0), (B, 1), (C, 2));
impl_native_fn!((A, 0), (B, 1), (C, 2), (D, 3));
impl_native_fn!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_native_fn!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (G, 5));
impl_native_fn!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (G, 5), (H, 6));
impl_native_fn!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (G, 5), (H, 6), (I, 7));

/// Wrap a typed native function into an engine-callable [`Value`].
///
/// ```
/// use stackbind::{wrap, Engine};
///
/// let engine = Engine::mock();
/// let add = engine.push(wrap(|a: i64, b: i64| a + b));
/// let sum: i64 = stackbind::Lazy::from_slot(add).call((2, 3)).cast().unwrap();
/// assert_eq!(sum, 5);
/// ```
pub fn wrap<Args: 'static, F>(f: F) -> Value
where
    F: NativeFunction<Args> + 'static,
{
    boundary(move |ctx| f.invoke(ctx))
}

/// Wrap a function that works on the [`CallContext`] directly, for variadic
/// arity or manual result packing.
pub fn wrap_raw<F>(f: F) -> Value
where
    F: Fn(&mut CallContext<'_>) -> BindResult<Retval> + 'static,
{
    boundary(f)
}

/// The engine/native boundary shim shared by both wrappers.
fn boundary<F>(f: F) -> Value
where
    F: Fn(&mut CallContext<'_>) -> BindResult<Retval> + 'static,
{
    let native: RawNativeFn = Rc::new(move |engine: &Engine| {
        let mut ctx = CallContext::new(engine);
        match catch_unwind(AssertUnwindSafe(|| f(&mut ctx))) {
            Ok(Ok(rv)) => Ok(rv.count()),
            Ok(Err(err)) => Err(raise(engine, err)),
            Err(panic) => Err(raise(engine, BindError::Raised(panic_message(panic)))),
        }
    });
    Value::Native(native)
}

/// Leave `err` on the stack top as the engine's error value.
///
/// An engine-originated [`CallError`](crate::CallError) propagates its
/// original payload unchanged; everything else is raised as its rendered
/// message.
fn raise(engine: &Engine, err: BindError) -> RawFault {
    match err {
        BindError::Call(call) => {
            engine.push_value(call.payload);
        }
        other => {
            engine.push_value(Value::Str(other.to_string()));
        }
    }
    RawFault
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "native function panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindError;
    use crate::lazy::Lazy;

    fn call_wrapped(engine: &Engine, f: Value, args: impl crate::convert::ToValues) -> Lazy<'_> {
        let slot = engine.push(f);
        Lazy::from_slot(slot).call(args)
    }

    #[test]
    fn zero_arity_function() {
        let engine = Engine::mock();
        let f = wrap(|| 99i64);
        assert_eq!(call_wrapped(&engine, f, ()).cast::<i64>().unwrap(), 99);
    }

    #[test]
    fn two_arity_addition() {
        let engine = Engine::mock();
        let f = wrap(|a: i64, b: i64| a + b);
        assert_eq!(call_wrapped(&engine, f, (2i64, 3i64)).cast::<i64>().unwrap(), 5);
    }

    #[test]
    fn missing_argument_reports_arity() {
        let engine = Engine::mock();
        let f = wrap(|a: i64, b: i64| a + b);
        let err = call_wrapped(&engine, f, (2i64,)).cast::<i64>().unwrap_err();
        let BindError::Call(call) = err else {
            panic!("expected engine-raised error, got {err:?}");
        };
        assert!(call.message().contains("argument 1"));
    }

    #[test]
    fn err_return_raises_in_engine() {
        let engine = Engine::mock();
        let f = wrap(|| -> Result<i64, String> { Err("broke".into()) });
        let err = call_wrapped(&engine, f, ()).cast::<i64>().unwrap_err();
        let BindError::Call(call) = err else {
            panic!("expected engine-raised error, got {err:?}");
        };
        assert_eq!(call.message(), "broke");
    }

    #[test]
    fn panic_is_contained_at_the_boundary() {
        let engine = Engine::mock();
        let f = wrap(|| -> i64 { panic!("boom") });
        let err = call_wrapped(&engine, f, ()).cast::<i64>().unwrap_err();
        let BindError::Call(call) = err else {
            panic!("expected engine-raised error, got {err:?}");
        };
        assert_eq!(call.message(), "boom");
        // The boundary restored the frame; the engine is still usable.
        let ok = wrap(|| 1i64);
        assert_eq!(call_wrapped(&engine, ok, ()).cast::<i64>().unwrap(), 1);
    }

    #[test]
    fn wrap_raw_sees_variadic_arity() {
        let engine = Engine::mock();
        let f = wrap_raw(|ctx| {
            let mut total = 0i64;
            for i in 0..ctx.arity() {
                total += ctx.arg::<i64>(i)?;
            }
            ctx.ret(total)
        });
        assert_eq!(
            call_wrapped(&engine, f, (1i64, 2i64, 3i64, 4i64))
                .cast::<i64>()
                .unwrap(),
            10
        );
    }

    #[test]
    fn multiple_results_come_back_in_order() {
        let engine = Engine::mock();
        let f = wrap(|a: i64| (a, a * a));
        let slot = engine.push(f);
        let results = Lazy::from_slot(slot).invoke((5i64,)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.cast::<i64>(0).unwrap(), 5);
        assert_eq!(results.cast::<i64>(1).unwrap(), 25);
    }
}
