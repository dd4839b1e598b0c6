//! Stable exit codes for `suite` commands.

/// Every selected case passed, or a non-run command succeeded.
pub const OK: i32 = 0;
/// At least one case failed a lifecycle step or an identifier assertion.
pub const FAILED: i32 = 1;
/// Invalid config or registry, or any other error before cases ran.
pub const INVALID: i32 = 2;
/// No case failed, but the deadline cancelled at least one.
pub const CANCELLED: i32 = 3;
