//! Emporium Core - Shared domain types.
//!
//! This crate provides the value types used across all Emporium components:
//! - `storefront` - HTTP API for auth, catalog and orders
//! - `cli` - Command-line tools for migrations, seeding and user provisioning
//!
//! # Architecture
//!
//! The core crate contains only types and their validation rules - no I/O,
//! no database access, no HTTP. Every constructor validates, so a value of
//! one of these types is always well-formed.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, quantities, and account identity types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
