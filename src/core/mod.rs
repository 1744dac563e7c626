//! Control plane: the workspace engine and everything it is built from.
//!
//! `workspace` owns the engine value; `lifecycle` drives proposals through
//! it; `state`, `integrity`, and `graph` are the consistency machinery
//! underneath. `rpc` and `tui` are the two ways out.

pub mod config;
pub mod error;
pub mod fields;
pub mod git;
pub mod graph;
pub mod integrity;
pub mod journal;
pub mod layout;
pub mod lifecycle;
pub mod repo;
pub mod rpc;
pub mod slug;
pub mod state;
pub mod templates;
pub mod time;
pub mod tui;
pub mod workspace;
