//! ZDX CLI library.
//!
//! This module exports public APIs for testing and extension.

pub mod config;
pub mod context;
pub mod engine;
pub mod events;
pub mod interrupt;
pub mod paths;
pub mod providers;
pub mod renderer;
pub mod tools;
