//! Terminal front end for parley.
//!
//! Chat with Claude and Gemini side by side, or let them talk to each
//! other about a topic.

pub mod config;
pub mod error;
pub mod repl;

pub use config::ParleyConfig;
pub use error::CliError;
