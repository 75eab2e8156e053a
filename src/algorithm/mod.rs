//! Backend-independent algorithms
//!
//! Algorithms here operate on single blocks or on per-block partial results.
//! Backends decide where each block is processed; the arithmetic and the
//! merge order are fixed here, so every backend reports the same numbers.

pub mod statistics;
