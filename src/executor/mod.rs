//! Command executor module.
//!
//! The single process boundary of the agent: spawns one external command
//! at a time with a timeout and captured output.

mod output;
mod subprocess;
#[cfg(test)]
pub(crate) mod testing;

pub use output::{command_line, sanitize_output};
pub use subprocess::{
    CommandRunner, CommandSpec, ExecResult, SystemRunner, DEFAULT_TIMEOUT,
    SIGNALLED_RETURN_CODE,
};
