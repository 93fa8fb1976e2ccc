//! Core ZDX library (engine, providers, tools, config).

pub mod config;
pub mod core;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod tools;
