//! CLI components.

pub mod commands;
pub mod completion;
pub mod repl;
pub mod runner;

pub use commands::ReplCommand;
pub use completion::{create_reedline, MchatCompleter, MchatPrompt, COMMANDS};
pub use repl::Repl;
pub use runner::{run_interactive, run_single_prompt};
