//! Typed value references and lazy operation chains over an embedded
//! stack-based scripting engine.
//!
//! The engine itself sits behind the [`RawEngine`](raw::RawEngine) boundary;
//! this crate supplies everything an embedder touches above it:
//!
//! - [`Engine`]: cheap-clone handle to one engine instance
//! - [`Slot`]: non-owning reference to a live stack slot
//! - [`OwnedValue`]: persistent reference surviving frame unwinds
//! - [`Lazy`]: deferred index/call chains, evaluated only when forced
//! - [`Table`] / [`Entry`]: table proxies with lazy reads and eager writes
//! - [`ToValue`] / [`FromSlot`] and friends: conversion traits between
//!   native and engine values
//! - [`wrap`]: native Rust functions as engine-callable values, with
//!   errors and panics contained at the boundary
//! - [`CallContext`]: the frame view inside a wrapped function
//!
//! # Example
//!
//! ```
//! use stackbind::{wrap, Engine};
//!
//! let engine = Engine::mock();
//! let config = engine.create_table();
//! config.set("name", "orbital").unwrap();
//! config.set("retries", 3i64).unwrap();
//! assert_eq!(config.get("retries").cast::<i64>().unwrap(), 3);
//!
//! // A chain is inert until forced.
//! let pending = config.get("name");
//! assert_eq!(pending.cast::<String>().unwrap(), "orbital");
//!
//! // Native functions become callable engine values.
//! let add = engine.push(wrap(|a: i64, b: i64| a + b));
//! let sum: i64 = stackbind::Lazy::from_slot(add).call((2, 3)).cast().unwrap();
//! assert_eq!(sum, 5);
//! ```
//!
//! # Protocol revisions and strictness
//!
//! The target protocol revision is a build-time choice (`proto-51`,
//! `proto-52`, `proto-53`); see [`config`]. The `strict-*` features disable
//! individual implicit coercions.

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod lazy;
pub mod owned;
pub mod raw;
pub mod registry;
pub mod runtime;
pub mod slot;
pub mod table;
pub mod types;

pub use convert::{FromSlot, ToReturn, ToValue, ToValues};
pub use engine::Engine;
pub use error::{BindError, BindResult, CallError};
pub use lazy::{Lazy, ResultSet};
pub use owned::OwnedValue;
pub use registry::{register_arg_converter, register_class, register_ret_converter};
pub use runtime::{CallContext, NativeFunction, Retval, wrap, wrap_raw};
pub use slot::Slot;
pub use table::{Entry, Table};
pub use types::{KindSet, UserType, Value, ValueKind};

pub mod prelude {
    //! One-stop import for embedders.
    pub use crate::convert::{FromSlot, ToReturn, ToValue, ToValues};
    pub use crate::engine::Engine;
    pub use crate::error::{BindError, BindResult, CallError};
    pub use crate::lazy::{Lazy, ResultSet};
    pub use crate::owned::OwnedValue;
    pub use crate::runtime::{CallContext, Retval, wrap, wrap_raw};
    pub use crate::slot::Slot;
    pub use crate::table::{Entry, Table};
    pub use crate::types::{KindSet, UserType, Value, ValueKind};
}
