//! Algorithm implementations for reconciliation.
//!
//! - `diff`: tree diff engine producing patches
//! - `lis`: stable subsequence selection for keyed moves
//! - `hash`: Stable hashing utilities

mod diff;
pub(crate) mod hash;
mod lis;

pub use diff::{diff, diff_with_config, DiffConfig, DiffEngine, DiffResult, DiffStats, Strategy};
pub(crate) use diff::full_replace;
pub use hash::StableHasher;
