/// Router Module Index
///
/// Routes are split by access level. Protected handlers enforce their permission through the
/// `Authorized<P>` extractor, so no router-wide auth layer is needed and a missing scope can
/// never be skipped by mounting a handler under the wrong router.

/// Read-only routes open to anonymous clients.
pub mod public;

/// Mutating routes. Every handler here takes an `Authorized<P>` as its first argument.
pub mod protected;
