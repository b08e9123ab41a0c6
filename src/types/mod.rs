//! Core value types shared across the binding.

mod user_data;
mod value;

pub use user_data::UserType;
pub use value::{KindSet, Value, ValueKind};
