//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of process and filesystem side effects. They
//! operate on in-memory data and return deterministic outputs suitable for
//! tests.

pub mod assertion;
pub mod budget;
pub mod classifier;
pub mod output;
pub mod policy;
pub mod types;
