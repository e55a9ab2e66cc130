//! Linkdock — personal bookmark dashboard engine with optimistic updates
//! and live change sync.
//!
//! This library crate exposes all modules for use by the binary and
//! integration tests.

pub mod app;
pub mod managers;
pub mod services;
pub mod types;
