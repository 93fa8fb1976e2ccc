//! CLI command handlers.

pub mod auth;
pub mod chat;
pub mod config;
pub mod exec;
pub mod models;
pub mod threads;
pub mod worktree;
