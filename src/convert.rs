//! Conversion traits between native types and engine values.
//!
//! - [`ToValue`]: native value → engine-pushable [`Value`] (never touches
//!   the engine)
//! - [`FromSlot`]: stack slot → native value (fallible)
//! - [`ToValues`]: argument packs for calls (tuples, `Vec<Value>`)
//! - [`ToReturn`]: return packing for wrapped native functions
//!
//! Reads resolve in three steps: exact built-in kind by the engine's dynamic
//! tag, extension-type match by class name, then the process-wide
//! [registry](crate::registry) entry for the type. Failures surface as
//! [`BindError::TypeMismatch`] with the accepted [`KindSet`] and the actual
//! kind.
//!
//! ## Numeric domain
//!
//! Conversions follow the engine's numeric domain: floats convert to
//! integers only when fraction-free and in range (`NumberNotIntegral` /
//! `IntegerOverflow` / `NumberOutOfRange` otherwise); nothing truncates
//! implicitly. Under protocol revisions 51/52 the domain is float-only and
//! native integers are carried as floats. `u64` values beyond `i64::MAX`
//! cross into the float domain, so exactness ends at 2^53 there; reads
//! reject negative engine integers rather than wrapping.
//!
//! ## Coercions and strictness
//!
//! Two engine-style coercions are on by default and can be disabled:
//! numeric reads accept numeric strings (`strict-arith` disables), string
//! reads accept numbers (`strict-concat` disables). Booleans never coerce.
//!
//! ## Extension and user-registered types
//!
//! Extension types travel as `Rc<T>` where `T:`[`UserType`]. Types the
//! embedder cannot implement [`FromSlot`] for (foreign types) go through
//! converters registered in the [registry](crate::registry) instead.

use std::any::Any;
use std::rc::Rc;

use crate::config;
use crate::error::{BindError, BindResult};
use crate::owned::OwnedValue;
use crate::runtime::{CallContext, Retval};
use crate::slot::Slot;
use crate::types::{KindSet, UserType, Value, ValueKind};

/// Convert a native value into an engine-pushable [`Value`].
///
/// Implementations must not interact with the engine; deferred keys and
/// arguments are held in `Value` form until a chain is forced.
pub trait ToValue {
    /// Perform the conversion.
    fn to_value(self) -> Value;
}

/// Extract a native value from a stack slot.
///
/// Embedders implement this for their own types to get compile-time
/// dispatched argument conversion; foreign types use the runtime
/// [registry](crate::registry) instead.
pub trait FromSlot: Sized {
    /// Perform the conversion.
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self>;
}

// ============================================================================
// Numeric helpers
// ============================================================================

fn float_to_int(f: f64, target: &'static str) -> BindResult<i64> {
    if f.fract() != 0.0 {
        return Err(BindError::NumberNotIntegral { value: f, target });
    }
    // 2^63 is exactly representable; i64::MAX is not.
    if !(f >= -(2f64.powi(63)) && f < 2f64.powi(63)) {
        return Err(BindError::NumberOutOfRange { value: f, target });
    }
    Ok(f as i64)
}

/// Read any numeric slot as a whole `i64`, honoring string coercion.
fn whole_int(slot: &Slot<'_>, target: &'static str) -> BindResult<i64> {
    let raw = slot.engine().raw();
    let index = slot.index();
    match slot.kind() {
        ValueKind::Int => raw
            .read_int(index)
            .ok_or_else(|| BindError::mismatch(KindSet::NUMBER, ValueKind::Nil)),
        ValueKind::Float => {
            let f = raw
                .read_float(index)
                .ok_or_else(|| BindError::mismatch(KindSet::NUMBER, ValueKind::Nil))?;
            float_to_int(f, target)
        }
        ValueKind::Str if !config::STRICT_ARITH => {
            let s = raw
                .read_str(index)
                .ok_or_else(|| BindError::mismatch(KindSet::STR, ValueKind::Nil))?;
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                Ok(v)
            } else if let Ok(f) = s.parse::<f64>() {
                float_to_int(f, target)
            } else {
                Err(BindError::mismatch(KindSet::NUMBER, ValueKind::Str))
            }
        }
        actual => Err(BindError::mismatch(KindSet::NUMBER, actual)),
    }
}

fn whole_float(slot: &Slot<'_>) -> BindResult<f64> {
    let raw = slot.engine().raw();
    let index = slot.index();
    match slot.kind() {
        ValueKind::Float => raw
            .read_float(index)
            .ok_or_else(|| BindError::mismatch(KindSet::NUMBER, ValueKind::Nil)),
        ValueKind::Int => Ok(raw
            .read_int(index)
            .ok_or_else(|| BindError::mismatch(KindSet::NUMBER, ValueKind::Nil))?
            as f64),
        ValueKind::Str if !config::STRICT_ARITH => {
            let s = raw
                .read_str(index)
                .ok_or_else(|| BindError::mismatch(KindSet::STR, ValueKind::Nil))?;
            s.trim()
                .parse::<f64>()
                .map_err(|_| BindError::mismatch(KindSet::NUMBER, ValueKind::Str))
        }
        actual => Err(BindError::mismatch(KindSet::NUMBER, actual)),
    }
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_convert_int {
    ($($ty:ty),*) => {$(
        impl FromSlot for $ty {
            fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
                let v = whole_int(slot, stringify!($ty))?;
                if v >= Self::MIN as i64 && v <= Self::MAX as i64 {
                    Ok(v as Self)
                } else {
                    Err(BindError::IntegerOverflow {
                        value: v,
                        target: stringify!($ty),
                    })
                }
            }
        }

        impl ToValue for $ty {
            fn to_value(self) -> Value {
                if config::FLOAT_ONLY_NUMBERS {
                    Value::Float(self as f64)
                } else {
                    Value::Int(self as i64)
                }
            }
        }
    )*};
}

impl_convert_int!(i8, i16, i32, u8, u16, u32);

impl FromSlot for i64 {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        whole_int(slot, "i64")
    }
}

impl ToValue for i64 {
    fn to_value(self) -> Value {
        if config::FLOAT_ONLY_NUMBERS {
            Value::Float(self as f64)
        } else {
            Value::Int(self)
        }
    }
}

impl FromSlot for u64 {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        let v = whole_int(slot, "u64")?;
        u64::try_from(v).map_err(|_| BindError::IntegerOverflow {
            value: v,
            target: "u64",
        })
    }
}

// Values beyond i64 fall back to the float domain; the engine has no wider
// integer to hold them.
impl ToValue for u64 {
    fn to_value(self) -> Value {
        if config::FLOAT_ONLY_NUMBERS {
            Value::Float(self as f64)
        } else if let Ok(v) = i64::try_from(self) {
            Value::Int(v)
        } else {
            Value::Float(self as f64)
        }
    }
}

macro_rules! impl_convert_size {
    ($($ty:ty),*) => {$(
        impl FromSlot for $ty {
            fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
                let v = whole_int(slot, stringify!($ty))?;
                <$ty>::try_from(v).map_err(|_| BindError::IntegerOverflow {
                    value: v,
                    target: stringify!($ty),
                })
            }
        }

        impl ToValue for $ty {
            fn to_value(self) -> Value {
                (self as i64).to_value()
            }
        }
    )*};
}

impl_convert_size!(usize, isize);

// ============================================================================
// Float implementations
// ============================================================================

impl FromSlot for f64 {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        whole_float(slot)
    }
}

impl ToValue for f64 {
    fn to_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromSlot for f32 {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        let v = whole_float(slot)?;
        if v.is_finite() && (v > f32::MAX as f64 || v < f32::MIN as f64) {
            return Err(BindError::NumberOutOfRange {
                value: v,
                target: "f32",
            });
        }
        Ok(v as f32)
    }
}

impl ToValue for f32 {
    fn to_value(self) -> Value {
        Value::Float(self as f64)
    }
}

// ============================================================================
// Bool, string, nil
// ============================================================================

impl FromSlot for bool {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        match slot.kind() {
            ValueKind::Bool => slot
                .engine()
                .raw()
                .read_bool(slot.index())
                .ok_or_else(|| BindError::mismatch(KindSet::BOOL, ValueKind::Nil)),
            actual => Err(BindError::mismatch(KindSet::BOOL, actual)),
        }
    }
}

impl ToValue for bool {
    fn to_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromSlot for String {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        let raw = slot.engine().raw();
        match slot.kind() {
            ValueKind::Str => raw
                .read_str(slot.index())
                .ok_or_else(|| BindError::mismatch(KindSet::STR, ValueKind::Nil)),
            ValueKind::Int if !config::STRICT_CONCAT => Ok(raw
                .read_int(slot.index())
                .ok_or_else(|| BindError::mismatch(KindSet::NUMBER, ValueKind::Nil))?
                .to_string()),
            ValueKind::Float if !config::STRICT_CONCAT => Ok(raw
                .read_float(slot.index())
                .ok_or_else(|| BindError::mismatch(KindSet::NUMBER, ValueKind::Nil))?
                .to_string()),
            actual => Err(BindError::mismatch(KindSet::STR, actual)),
        }
    }
}

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::Str(self)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl ToValue for () {
    fn to_value(self) -> Value {
        Value::Nil
    }
}

// ============================================================================
// Option, Value, handles, extension types
// ============================================================================

impl<T: FromSlot> FromSlot for Option<T> {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        if slot.kind() == ValueKind::Nil {
            Ok(None)
        } else {
            T::from_slot(slot).map(Some)
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Nil,
        }
    }
}

impl FromSlot for Value {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        slot.snapshot()
    }
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

impl FromSlot for OwnedValue {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        Ok(slot.persist())
    }
}

impl ToValue for OwnedValue {
    fn to_value(self) -> Value {
        Value::Handle(self)
    }
}

impl ToValue for &OwnedValue {
    fn to_value(self) -> Value {
        Value::Handle(self.clone())
    }
}

impl<T: UserType> FromSlot for Rc<T> {
    fn from_slot(slot: &Slot<'_>) -> BindResult<Self> {
        let raw = slot.engine().raw();
        match slot.kind() {
            ValueKind::Userdata => {
                let found = raw.userdata_class(slot.index()).unwrap_or("userdata");
                if found != T::CLASS_NAME {
                    return Err(BindError::UserdataClass {
                        expected: T::CLASS_NAME,
                        found,
                    });
                }
                let data = raw
                    .read_userdata(slot.index())
                    .ok_or_else(|| BindError::mismatch(KindSet::USERDATA, ValueKind::Nil))?;
                // Same class name but a different native type: the class
                // namespace has a collision.
                data.downcast::<T>()
                    .map_err(|_| BindError::RegistrationConflict {
                        type_name: std::any::type_name::<T>(),
                    })
            }
            actual => Err(BindError::mismatch(KindSet::USERDATA, actual)),
        }
    }
}

impl<T: UserType> ToValue for Rc<T> {
    fn to_value(self) -> Value {
        Value::User {
            data: self,
            class: T::CLASS_NAME,
        }
    }
}

// ============================================================================
// Argument packs
// ============================================================================

/// An ordered pack of call arguments.
///
/// Implemented for tuples up to eight elements (`(x,)` for a single
/// argument), the empty tuple and `Vec<Value>`.
pub trait ToValues {
    /// Convert the pack into ordered values.
    fn to_values(self) -> Vec<Value>;
}

impl ToValues for Vec<Value> {
    fn to_values(self) -> Vec<Value> {
        self
    }
}

macro_rules! impl_to_values_tuple {
    () => {
        impl ToValues for () {
            fn to_values(self) -> Vec<Value> {
                Vec::new()
            }
        }
    };
    ($($name:ident),+) => {
        impl<$($name: ToValue),+> ToValues for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.to_value()),+]
            }
        }
    };
}

impl_to_values_tuple!();
impl_to_values_tuple!(A);
impl_to_values_tuple!(A, B);
impl_to_values_tuple!(A, B, C);
impl_to_values_tuple!(A, B, C, D);
impl_to_values_tuple!(A, B, C, D, E);
impl_to_values_tuple!(A, B, C, D, E, F);
impl_to_values_tuple!(A, B, C, D, E, F, G);
impl_to_values_tuple!(A, B, C, D, E, F, G, H);

// ============================================================================
// Return packing
// ============================================================================

/// Pack a native function's return value into the outgoing-result area of a
/// [`CallContext`].
///
/// `()` produces no results; tuples produce one result per element in
/// order; `Result<T, E>` maps `Err` to an error raised inside the engine.
/// Each element goes through the registered custom return converter for its
/// type, or the default [`ToValue`] path.
pub trait ToReturn {
    /// Perform the packing.
    fn to_return(self, ctx: &mut CallContext<'_>) -> BindResult<Retval>;
}

macro_rules! impl_to_return {
    ($($ty:ty),* $(,)?) => {$(
        impl ToReturn for $ty {
            fn to_return(self, ctx: &mut CallContext<'_>) -> BindResult<Retval> {
                ctx.ret_value(self)?;
                Ok(ctx.done())
            }
        }
    )*};
}

impl_to_return!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, String, &'static str,
    Value, OwnedValue,
);

impl ToReturn for () {
    fn to_return(self, ctx: &mut CallContext<'_>) -> BindResult<Retval> {
        Ok(ctx.done())
    }
}

impl<T: ToValue + Any> ToReturn for Option<T> {
    fn to_return(self, ctx: &mut CallContext<'_>) -> BindResult<Retval> {
        ctx.ret_value(self)?;
        Ok(ctx.done())
    }
}

impl<T: UserType> ToReturn for Rc<T> {
    fn to_return(self, ctx: &mut CallContext<'_>) -> BindResult<Retval> {
        ctx.ret_value(self)?;
        Ok(ctx.done())
    }
}

impl<T: ToReturn, E: std::fmt::Display> ToReturn for Result<T, E> {
    fn to_return(self, ctx: &mut CallContext<'_>) -> BindResult<Retval> {
        match self {
            Ok(v) => v.to_return(ctx),
            Err(e) => Err(BindError::Raised(e.to_string())),
        }
    }
}

macro_rules! impl_to_return_tuple {
    ($($name:ident),+) => {
        impl<$($name: ToValue + Any),+> ToReturn for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_return(self, ctx: &mut CallContext<'_>) -> BindResult<Retval> {
                let ($($name,)+) = self;
                $(ctx.ret_value($name)?;)+
                Ok(ctx.done())
            }
        }
    };
}

impl_to_return_tuple!(A, B);
impl_to_return_tuple!(A, B, C);
impl_to_return_tuple!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    fn cast_of<T: FromSlot>(engine: &Engine, v: impl ToValue) -> BindResult<T> {
        let _g = engine.guard();
        engine.push(v).cast::<T>()
    }

    #[test]
    fn int_narrowing_checks_bounds() {
        let engine = Engine::mock();
        assert_eq!(cast_of::<i8>(&engine, 127i64).unwrap(), 127);
        assert!(matches!(
            cast_of::<i8>(&engine, 128i64),
            Err(BindError::IntegerOverflow { target: "i8", .. })
        ));
        assert!(matches!(
            cast_of::<u16>(&engine, -1i64),
            Err(BindError::IntegerOverflow { target: "u16", .. })
        ));
    }

    #[test]
    fn float_to_int_requires_whole_number() {
        let engine = Engine::mock();
        assert_eq!(cast_of::<i64>(&engine, 4.0f64).unwrap(), 4);
        assert!(matches!(
            cast_of::<i64>(&engine, 4.5f64),
            Err(BindError::NumberNotIntegral { .. })
        ));
        assert!(matches!(
            cast_of::<i64>(&engine, 1e300f64),
            Err(BindError::NumberOutOfRange { .. })
        ));
    }

    #[test]
    fn u64_roundtrips_within_the_integer_domain() {
        let engine = Engine::mock();
        if !config::FLOAT_ONLY_NUMBERS {
            assert_eq!(
                cast_of::<u64>(&engine, i64::MAX as u64).unwrap(),
                i64::MAX as u64
            );
        }
        assert_eq!(cast_of::<u64>(&engine, 7u64).unwrap(), 7);
    }

    #[test]
    fn u64_rejects_negative_engine_integers() {
        let engine = Engine::mock();
        if config::FLOAT_ONLY_NUMBERS {
            return;
        }
        assert!(matches!(
            cast_of::<u64>(&engine, -1i64),
            Err(BindError::IntegerOverflow { target: "u64", .. })
        ));
        // Float and integer reads agree on the sign check.
        assert!(matches!(
            cast_of::<u64>(&engine, -1.0f64),
            Err(BindError::IntegerOverflow { target: "u64", .. })
        ));
    }

    #[test]
    fn bool_never_coerces() {
        let engine = Engine::mock();
        assert!(cast_of::<bool>(&engine, true).unwrap());
        assert!(matches!(
            cast_of::<bool>(&engine, 1i64),
            Err(BindError::TypeMismatch { .. })
        ));
        assert!(matches!(
            cast_of::<i64>(&engine, true),
            Err(BindError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn numeric_strings_coerce_unless_strict() {
        let engine = Engine::mock();
        if config::STRICT_ARITH {
            assert!(cast_of::<i64>(&engine, " 42 ").is_err());
        } else {
            assert_eq!(cast_of::<i64>(&engine, " 42 ").unwrap(), 42);
            assert_eq!(cast_of::<f64>(&engine, "2.5").unwrap(), 2.5);
            assert!(cast_of::<i64>(&engine, "nope").is_err());
        }
    }

    #[test]
    fn numbers_render_as_strings_unless_strict() {
        let engine = Engine::mock();
        if config::STRICT_CONCAT {
            assert!(cast_of::<String>(&engine, 7i64).is_err());
        } else if config::FLOAT_ONLY_NUMBERS {
            assert_eq!(cast_of::<String>(&engine, 7i64).unwrap(), "7");
        } else {
            assert_eq!(cast_of::<String>(&engine, 7i64).unwrap(), "7");
            assert_eq!(cast_of::<String>(&engine, 2.5f64).unwrap(), "2.5");
        }
    }

    #[test]
    fn option_maps_nil() {
        let engine = Engine::mock();
        assert_eq!(cast_of::<Option<i64>>(&engine, ()).unwrap(), None);
        assert_eq!(cast_of::<Option<i64>>(&engine, 3i64).unwrap(), Some(3));
        assert!(cast_of::<Option<i64>>(&engine, "x y").is_err());
    }

    #[test]
    fn string_roundtrip_copies() {
        let engine = Engine::mock();
        let s: String = cast_of(&engine, "byte for byte").unwrap();
        assert_eq!(s, "byte for byte");
    }

    #[test]
    fn tuple_packs_preserve_order() {
        let vals = (1i64, "two", 3.0f64).to_values();
        assert_eq!(vals.len(), 3);
        assert!(matches!(vals[1], Value::Str(ref s) if s == "two"));
    }
}
