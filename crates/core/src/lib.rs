//! Storecart Core - Shared types library.
//!
//! This crate provides common types used across all Storecart components:
//! - `sync` - Cart synchronization core (mirror store, sync engine, identity gate)
//! - `cli` - Command-line driver for the sync engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
