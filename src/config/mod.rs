//! # Configuration Module
//!
//! This module centralizes the layout and tuning constants for blobkv.
//! Constants are grouped by functional area and their interdependencies are
//! documented and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The buffer layout constants are tightly coupled: the meta overhead depends
//! on the header size and the rank count, the rank count must cover the rank
//! of the largest supported buffer, and every absolute offset must fit in the
//! packed header fields. Co-locating these values and pinning the derivations
//! with compile-time checks prevents mismatch bugs when one of them changes.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
