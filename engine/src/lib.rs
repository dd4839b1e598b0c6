//! Retry-aware execution and assertion engine for infrastructure module checks.
//!
//! The engine drives an external provisioning tool (Terraform by default)
//! through a fixed lifecycle against a target directory and checks the plan
//! output for expected resource or module identifiers. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (failure classification, retry
//!   policy, assertions, output normalization). No I/O.
//! - **[`io`]**: Side-effecting adapters (configuration files, tool processes).
//!   Hidden behind the [`io::tool::Tool`] trait so tests can script them.
//!
//! [`executor`] and [`lifecycle`] coordinate the two: one command with
//! retries, and one case through `init` then `plan` or `validate`.

pub mod core;
pub mod executor;
pub mod io;
pub mod lifecycle;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
