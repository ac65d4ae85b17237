//! Raw SQL operations backing the `JobRegistry` and `WorkQueue` wrappers. Kept as
//! free functions over `&PgPool` so they can be exercised directly in tests without
//! constructing the higher-level wrapper types.

pub mod queue;
pub mod registry;
