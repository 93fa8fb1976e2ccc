pub mod exec;
pub mod stdout;

pub use exec::{ExecOptions, execute_prompt_streaming};
pub use stdout::spawn_renderer_task;
