//! Shared infrastructure utilities for Dragnet.
//!
//! This crate provides cross-cutting utilities that multiple Dragnet crates
//! need but that don't belong in the domain-pure `dragnet-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`sanitize`**: Turning target identifiers into safe directory names

pub mod atomic_write;
pub mod sanitize;

pub use atomic_write::{atomic_write, atomic_write_json};
pub use sanitize::sanitize_for_path;
