//! Conversation orchestration for parley.
//!
//! This crate provides:
//!
//! - **History**: Seeded, append-only message history per session
//! - **Orchestrator**: Routes turns to one or both backends and runs
//!   automated dialogues between them
//! - **Replies**: Tagged per-backend lines and dialogue transcripts
//! - **Formatting**: Terminal rendering of replies and transcripts

pub mod error;
pub mod format;
pub mod history;
pub mod message;
pub mod orchestrator;
pub mod reply;
pub mod session;
pub mod target;

pub use error::ConversationError;
pub use format::{format_reply, format_response, format_transcript_line};
pub use history::ConversationHistory;
pub use message::Message;
pub use orchestrator::{DialogueFailurePolicy, OrchestratorConfig, TurnOrchestrator};
pub use reply::{DialogueTurn, LineOutcome, Reply, TaggedLine, Transcript};
pub use session::{ChatSession, DEFAULT_INSTRUCTIONS};
pub use target::{ChatMode, ChatTarget};
