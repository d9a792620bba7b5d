//! Unit tests for fragmentation and reassembly.
//!
//! Tests are split into focused submodules to keep each file short and easy
//! to navigate.

mod window_tests;
