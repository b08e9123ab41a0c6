//! Custom converter registration and interception.
//!
//! The registry is process-global, so every test here uses its own native
//! types.

use stackbind::{
    BindError, CallContext, Engine, FromSlot, Slot, register_arg_converter,
    register_ret_converter, wrap, wrap_raw,
};

#[test]
fn registered_arg_converter_feeds_wrapped_functions() {
    struct Celsius(f64);

    register_arg_converter(|slot: &Slot<'_>| slot.cast::<f64>().map(Celsius)).unwrap();

    let engine = Engine::mock();
    let f = engine
        .push(wrap_raw(|ctx| {
            let c: Celsius = ctx.arg_registered(0)?;
            ctx.ret(c.0 * 9.0 / 5.0 + 32.0)
        }))
        .persist();
    assert_eq!(f.lazy().call((100.0f64,)).cast::<f64>().unwrap(), 212.0);
}

#[test]
fn registered_converter_wins_over_from_slot() {
    #[derive(PartialEq, Debug)]
    struct Tagged(i64);

    impl FromSlot for Tagged {
        fn from_slot(slot: &Slot<'_>) -> Result<Self, BindError> {
            slot.cast::<i64>().map(Tagged)
        }
    }

    // The registered path adds 1000, distinguishing it from FromSlot.
    register_arg_converter(|slot: &Slot<'_>| slot.cast::<i64>().map(|v| Tagged(v + 1000)))
        .unwrap();

    let engine = Engine::mock();
    let f = engine
        .push(wrap(|t: Tagged| t.0))
        .persist();
    assert_eq!(f.lazy().call((5i64,)).cast::<i64>().unwrap(), 1005);
}

#[test]
fn registered_ret_converter_expands_one_value() {
    struct Span {
        start: i64,
        end: i64,
    }

    register_ret_converter(|span: Span, ctx: &mut CallContext<'_>| {
        ctx.push_result(span.start);
        ctx.push_result(span.end);
        Ok(ctx.done())
    })
    .unwrap();

    let engine = Engine::mock();
    let f = engine
        .push(wrap_raw(|ctx| {
            ctx.ret_registered(Span { start: 3, end: 9 })?;
            Ok(ctx.done())
        }))
        .persist();

    let slot = f.push();
    let results = stackbind::Lazy::from_slot(slot).invoke(()).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results.cast::<i64>(0).unwrap(), 3);
    assert_eq!(results.cast::<i64>(1).unwrap(), 9);
}

#[test]
fn unregistered_type_reports_no_converter() {
    struct Foreign;

    let engine = Engine::mock();
    let f = engine
        .push(wrap_raw(|ctx| {
            let _: Foreign = ctx.arg_registered(0)?;
            ctx.ret(0i64)
        }))
        .persist();
    let err = f.lazy().call((1i64,)).cast::<i64>().unwrap_err();
    let BindError::Call(call) = err else {
        panic!("expected an engine-raised error");
    };
    assert!(call.message().contains("no conversion registered"));
}

#[test]
fn unregistered_return_type_reports_no_converter() {
    struct ForeignResult;

    let engine = Engine::mock();
    let f = engine
        .push(wrap_raw(|ctx| {
            ctx.ret_registered(ForeignResult)?;
            Ok(ctx.done())
        }))
        .persist();
    let err = f.lazy().call(()).cast::<Option<i64>>().unwrap_err();
    let BindError::Call(call) = err else {
        panic!("expected an engine-raised error");
    };
    assert!(call.message().contains("no conversion registered"));
}

#[test]
fn converter_failure_surfaces_as_conversion_error() {
    struct Positive(i64);

    register_arg_converter(|slot: &Slot<'_>| {
        let v = slot.cast::<i64>()?;
        if v > 0 {
            Ok(Positive(v))
        } else {
            Err(BindError::Raised(format!("{v} is not positive")))
        }
    })
    .unwrap();

    let engine = Engine::mock();
    let f = engine
        .push(wrap_raw(|ctx| {
            let p: Positive = ctx.arg_registered(0)?;
            ctx.ret(p.0)
        }))
        .persist();
    assert_eq!(f.lazy().call((3i64,)).cast::<i64>().unwrap(), 3);
    let err = f.lazy().call((-3i64,)).cast::<i64>().unwrap_err();
    let BindError::Call(call) = err else {
        panic!("expected an engine-raised error");
    };
    assert!(call.message().contains("not positive"));
}
