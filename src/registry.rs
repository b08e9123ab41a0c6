//! Process-wide conversion registry.
//!
//! The registry holds the late-bound half of the conversion machinery:
//! argument converters, return converters and extension-type class names
//! registered at startup for native types the compile-time traits cannot
//! cover (typically types foreign to the embedder's crate). It is populated
//! during setup, before first use, and is effectively read-only afterwards;
//! duplicate registration for the same native type is a configuration error
//! reported at registration time, never at call time.
//!
//! Converters registered here *intercept* the default paths: a registered
//! argument converter wins over `FromSlot` in
//! [`CallContext::arg`](crate::CallContext::arg), and a registered return
//! converter wins over `ToValue` when results are packed.

use std::any::{Any, TypeId};
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::error::{BindError, BindResult};
use crate::runtime::{CallContext, Retval};
use crate::slot::Slot;
use crate::types::UserType;

type ArgFn = Arc<dyn for<'e> Fn(&Slot<'e>) -> BindResult<Box<dyn Any>> + Send + Sync>;
type RetFn = Arc<dyn for<'e> Fn(Box<dyn Any>, &mut CallContext<'e>) -> BindResult<Retval> + Send + Sync>;

#[derive(Default)]
struct Registry {
    args: FxHashMap<TypeId, ArgFn>,
    rets: FxHashMap<TypeId, RetFn>,
    /// TypeId -> class name, and class name -> type name, to catch both
    /// directions of extension-type collision.
    class_of: FxHashMap<TypeId, &'static str>,
    class_names: FxHashMap<&'static str, &'static str>,
}

lazy_static! {
    static ref REGISTRY: RwLock<Registry> = RwLock::new(Registry::default());
}

/// Register a custom argument converter for native type `T`.
///
/// Used when wrapping native functions: the converter runs instead of the
/// default `FromSlot` path whenever an argument of type `T` is extracted.
/// At most one argument converter may exist per type.
pub fn register_arg_converter<T, F>(f: F) -> BindResult<()>
where
    T: 'static,
    F: for<'e> Fn(&Slot<'e>) -> BindResult<T> + Send + Sync + 'static,
{
    let mut reg = REGISTRY.write().map_err(|_| BindError::RegistryPoisoned)?;
    let key = TypeId::of::<T>();
    if reg.args.contains_key(&key) {
        return Err(BindError::RegistrationConflict {
            type_name: std::any::type_name::<T>(),
        });
    }
    reg.args.insert(
        key,
        Arc::new(move |slot| f(slot).map(|v| Box::new(v) as Box<dyn Any>)),
    );
    Ok(())
}

/// Register a custom return converter for native type `T`.
///
/// The converter receives the value and the active [`CallContext`] and must
/// produce its results through the context (one value of type `T` may
/// become several engine results). At most one return converter may exist
/// per type. The converter must not route a value of type `T` back through
/// the context's typed return path.
pub fn register_ret_converter<T, F>(f: F) -> BindResult<()>
where
    T: 'static,
    F: for<'e> Fn(T, &mut CallContext<'e>) -> BindResult<Retval> + Send + Sync + 'static,
{
    let mut reg = REGISTRY.write().map_err(|_| BindError::RegistryPoisoned)?;
    let key = TypeId::of::<T>();
    if reg.rets.contains_key(&key) {
        return Err(BindError::RegistrationConflict {
            type_name: std::any::type_name::<T>(),
        });
    }
    reg.rets.insert(
        key,
        Arc::new(move |boxed, ctx| {
            let v = match boxed.downcast::<T>() {
                Ok(v) => *v,
                Err(_) => unreachable!("return converter invoked with mismatched type"),
            };
            f(v, ctx)
        }),
    );
    Ok(())
}

/// Record an extension type's class name and check it for collisions.
///
/// Conversion itself dispatches on [`UserType::CLASS_NAME`] at compile
/// time; this registration exists so setup code can detect two types
/// claiming one class name (or one type registered twice) up front.
pub fn register_class<T: UserType>() -> BindResult<()> {
    let mut reg = REGISTRY.write().map_err(|_| BindError::RegistryPoisoned)?;
    let key = TypeId::of::<T>();
    let conflict = BindError::RegistrationConflict {
        type_name: std::any::type_name::<T>(),
    };
    if reg.class_of.contains_key(&key) || reg.class_names.contains_key(T::CLASS_NAME) {
        return Err(conflict);
    }
    reg.class_of.insert(key, T::CLASS_NAME);
    reg.class_names
        .insert(T::CLASS_NAME, std::any::type_name::<T>());
    Ok(())
}

/// Look up the argument converter for `T`, if one is registered.
pub(crate) fn arg_converter<T: 'static>() -> Option<ArgFn> {
    let reg = REGISTRY.read().ok()?;
    reg.args.get(&TypeId::of::<T>()).cloned()
}

/// Look up the return converter for `T`, if one is registered.
pub(crate) fn ret_converter<T: 'static>() -> Option<RetFn> {
    let reg = REGISTRY.read().ok()?;
    reg.rets.get(&TypeId::of::<T>()).cloned()
}

/// Run the registered argument converter for `T`, if any.
pub(crate) fn convert_arg<T: 'static>(slot: &Slot<'_>) -> Option<BindResult<T>> {
    let cvt = arg_converter::<T>()?;
    Some(cvt(slot).map(|boxed| match boxed.downcast::<T>() {
        Ok(v) => *v,
        Err(_) => unreachable!("argument converter produced mismatched type"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Meters(f64);
    struct Twice;

    #[test]
    fn duplicate_arg_converter_conflicts_at_registration() {
        register_arg_converter(|slot: &Slot<'_>| slot.cast::<f64>().map(Meters)).unwrap();
        let second = register_arg_converter(|slot: &Slot<'_>| slot.cast::<f64>().map(Meters));
        assert!(matches!(
            second,
            Err(BindError::RegistrationConflict { .. })
        ));
    }

    #[test]
    fn duplicate_class_name_conflicts() {
        struct A;
        struct B;
        impl UserType for A {
            const CLASS_NAME: &'static str = "registry_test_shared";
        }
        impl UserType for B {
            const CLASS_NAME: &'static str = "registry_test_shared";
        }
        register_class::<A>().unwrap();
        assert!(matches!(
            register_class::<B>(),
            Err(BindError::RegistrationConflict { .. })
        ));
        assert!(matches!(
            register_class::<A>(),
            Err(BindError::RegistrationConflict { .. })
        ));
    }

    #[test]
    fn lookup_is_none_for_unregistered_type() {
        assert!(arg_converter::<Twice>().is_none());
        assert!(ret_converter::<Twice>().is_none());
    }
}
