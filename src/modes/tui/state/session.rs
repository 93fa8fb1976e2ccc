//! Session state (re-export shim).
//!
//! This module re-exports from the session feature slice for backward compatibility.
//! See `src/modes/tui/session/` for the actual implementation.

pub use crate::modes::tui::session::{SessionOpsState, SessionState, SessionUsage};
