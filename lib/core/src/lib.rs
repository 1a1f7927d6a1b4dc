//! Core types and utilities for parley.
//!
//! This crate provides the identifiers and error-handling foundation shared
//! by the backend adapters, the conversation orchestrator, and the CLI.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{DialogueId, MessageId, ParseIdError, SessionId};
