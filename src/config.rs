//! Build-time configuration: engine protocol revision and strictness flags.
//!
//! The target engine's protocol revision is selected with the mutually
//! exclusive cargo features `proto-51`, `proto-52` and `proto-53` (the
//! default). Revisions 51 and 52 have a float-only numeric domain; native
//! integer values exist only from revision 53 on.
//!
//! The `strict-*` features disable individual implicit coercions that are
//! permissive by default; `strict` enables all of them.

#[cfg(any(
    all(feature = "proto-51", feature = "proto-52"),
    all(feature = "proto-51", feature = "proto-53"),
    all(feature = "proto-52", feature = "proto-53"),
))]
compile_error!("features `proto-51`, `proto-52` and `proto-53` are mutually exclusive");

/// Selected engine protocol revision.
#[cfg(feature = "proto-51")]
pub const PROTOCOL_REVISION: u32 = 51;

/// Selected engine protocol revision.
#[cfg(feature = "proto-52")]
pub const PROTOCOL_REVISION: u32 = 52;

/// Selected engine protocol revision.
#[cfg(not(any(feature = "proto-51", feature = "proto-52")))]
pub const PROTOCOL_REVISION: u32 = 53;

/// Whether the engine's numeric domain is float-only (revisions before 53).
///
/// When true, native integers are pushed as floats and integer reads go
/// through the float path with exactness checks.
pub const FLOAT_ONLY_NUMBERS: bool = PROTOCOL_REVISION < 53;

/// Refuse integral-float normalization of table keys in indexing contexts.
pub const STRICT_INDEX: bool = cfg!(feature = "strict-index");

/// Refuse string-to-number coercion on numeric reads.
pub const STRICT_ARITH: bool = cfg!(feature = "strict-arith");

/// Refuse number-to-string coercion on string reads.
pub const STRICT_CONCAT: bool = cfg!(feature = "strict-concat");
