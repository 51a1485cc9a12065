//! # Virtual Concat Test Suite
//!
//! Unified test crate for scenarios that span crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── lifecycle.rs  # Controller against the real device table and engine
//!     └── probe.rs      # Runtime probe loop, nesting and teardown order
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p vc-tests
//! cargo test -p vc-tests integration::probe
//! ```

pub mod integration;
