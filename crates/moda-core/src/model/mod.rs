//! Domain types for backlog levels, work-item snapshots, and health checks.

pub mod health;
pub mod item;
pub mod level;
