//! Scripted dispatch sessions.

mod runner;
mod script;
mod stats;

pub use runner::run_script;
pub use script::{parse_properties, ScriptEntry};
pub use stats::{delivery_line, SessionStats};
