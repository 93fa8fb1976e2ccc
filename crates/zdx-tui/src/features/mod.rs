//! Feature slices for the TUI (state/update/render per slice).

pub mod auth;
pub mod input;
pub mod statusline;
pub mod thread;
pub mod transcript;
