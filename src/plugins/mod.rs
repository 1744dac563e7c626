//! Subsystems layered on the core engine.

pub mod maintenance;
