//! Cross-crate integration scenarios.

mod lifecycle;
mod probe;
