//! Deterministic, pure logic shared by the planner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod codec;
pub mod invariants;
pub mod literal;
pub mod normalize;
pub mod transition;
pub mod types;
