//! Core ZDX library (engine, providers, tools, config).

pub mod automations;
pub mod config;
pub mod core;
pub mod images;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod skills;
pub mod tools;
