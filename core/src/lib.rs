//! Orchestration core for missions made of dependent, streaming model tasks.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod remote;
