//! Extension-type ("userdata") binder.
//!
//! Implementing [`UserType`] associates a native type with the textual class
//! name used for dynamic type tagging when instances cross into the engine.
//! Instances travel as `Rc<T>`; the engine holds a clone of the `Rc`, so the
//! value's `Drop` impl acts as the finalizer when the engine releases it.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use stackbind::{Engine, UserType};
//!
//! struct Sprite {
//!     frame: u32,
//! }
//!
//! impl UserType for Sprite {
//!     const CLASS_NAME: &'static str = "Sprite";
//! }
//!
//! let engine = Engine::mock();
//! let sprite = Rc::new(Sprite { frame: 3 });
//! let slot = engine.push(sprite.clone());
//! let back: Rc<Sprite> = slot.cast().unwrap();
//! assert!(Rc::ptr_eq(&sprite, &back));
//! assert_eq!(back.frame, 3);
//! ```

use std::any::Any;

/// A native type that the engine can hold as an opaque, class-tagged value.
///
/// `CLASS_NAME` must be unique across the whole binding session; collisions
/// are caught by [`register_class`](crate::registry::register_class) during
/// setup. Reading an instance back checks the slot's class name against
/// `CLASS_NAME` before downcasting, so two types never alias each other's
/// storage even if registration was skipped.
pub trait UserType: Any {
    /// Class name used for dynamic type tagging inside the engine.
    const CLASS_NAME: &'static str;
}
