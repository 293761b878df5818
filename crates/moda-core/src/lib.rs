//! moda-core library.
//!
//! Work items live in a local `SQLite` store ([`db`]). The [`rollup`] module
//! flattens Portfolio-tier hierarchies into the requirement-level work that
//! measures their progress.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for store plumbing, `thiserror` enums for
//!   domain failures callers branch on.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod db;
pub mod error;
pub mod integration;
pub mod model;
pub mod rollup;
