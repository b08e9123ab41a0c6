//! Deferred evaluation semantics, observed through the mock engine's
//! operation counter.

use std::rc::Rc;

use stackbind::raw::mock::MockEngine;
use stackbind::{Engine, wrap};

fn counted_engine() -> (Rc<MockEngine>, Engine) {
    let vm = Rc::new(MockEngine::new());
    let engine = Engine::from_shared(vm.clone());
    (vm, engine)
}

#[test]
fn building_a_chain_performs_no_operations() {
    let (vm, engine) = counted_engine();
    let t = engine.create_table();
    t.set("a", 1i64).unwrap();
    let before = vm.op_count();

    let chain = t.get("a").get("b").get("c");
    assert_eq!(vm.op_count(), before);
    drop(chain);
    assert_eq!(vm.op_count(), before);
}

#[test]
fn forcing_performs_one_operation_per_node() {
    let (vm, engine) = counted_engine();
    let outer = engine.create_table();
    let inner = engine.create_table();
    inner.set("x", 7i64).unwrap();
    outer.set("inner", inner.lazy().persist().unwrap()).unwrap();

    let chain = outer.get("inner").get("x");
    let before = vm.op_count();
    assert_eq!(chain.cast::<i64>().unwrap(), 7);
    // Two index nodes, two table reads, nothing else.
    assert_eq!(vm.op_count(), before + 2);
}

#[test]
fn forcing_twice_evaluates_twice() {
    let (vm, engine) = counted_engine();
    let t = engine.create_table();
    t.set("k", 1i64).unwrap();

    let chain = t.get("k");
    let before = vm.op_count();
    chain.cast::<i64>().unwrap();
    chain.cast::<i64>().unwrap();
    assert_eq!(vm.op_count(), before + 2);
}

#[test]
fn call_nodes_are_never_cached() {
    let (vm, engine) = counted_engine();
    let hits = Rc::new(std::cell::Cell::new(0u32));
    let hits_in = hits.clone();
    let f = engine
        .push(wrap(move || {
            hits_in.set(hits_in.get() + 1);
            0i64
        }))
        .persist();

    let chain = f.lazy().call(());
    let before = vm.op_count();
    chain.cast::<i64>().unwrap();
    chain.cast::<i64>().unwrap();
    assert_eq!(hits.get(), 2);
    assert_eq!(vm.op_count(), before + 2);
}

#[test]
fn writes_are_eager() {
    let (vm, engine) = counted_engine();
    let t = engine.create_table();
    let before = vm.op_count();
    t.set("now", 1i64).unwrap();
    assert_eq!(vm.op_count(), before + 1);
}

#[test]
fn absent_key_reads_as_none() {
    let (_vm, engine) = counted_engine();
    let t = engine.create_table();
    assert_eq!(t.get("ghost").cast::<Option<String>>().unwrap(), None);
}

#[test]
fn chain_through_call_result() {
    let (_vm, engine) = counted_engine();
    let t = engine.create_table();
    t.set("hp", 50i64).unwrap();
    let handle = t.lazy().persist().unwrap();
    let make = engine.push(wrap(move || handle.clone())).persist();

    // make().hp, deferred end to end.
    let hp: i64 = make.lazy().call(()).get("hp").cast().unwrap();
    assert_eq!(hp, 50);
}

#[test]
fn failed_force_restores_stack_depth() {
    let (_vm, engine) = counted_engine();
    let t = engine.create_table();
    let depth = engine.top();
    // "a" is nil, indexing it faults inside the engine.
    let err = t.get("a").get("b").cast::<i64>().unwrap_err();
    assert!(matches!(err, stackbind::BindError::Call(_)));
    assert_eq!(engine.top(), depth);
}
