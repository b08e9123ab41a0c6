//! Native call frames and function wrapping.

mod call_context;
mod native_fn;

pub use call_context::{CallContext, Retval};
pub use native_fn::{NativeFunction, wrap, wrap_raw};
