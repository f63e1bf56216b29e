//! Testing utilities for module developers
//!
//! Helpers and mocks that drive the capability contract without a host.

pub mod helpers;
pub mod mocks;

pub use helpers::ModuleTestHarness;
pub use mocks::{Hook, MockModule, MockProbe};
