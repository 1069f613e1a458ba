//! Hosted reasoning service over an OpenAI-compatible chat API.
//!
//! - **Client**: HTTP client for `/v1/chat/completions`
//! - **Reasoner**: [`ReasoningService`](crate::ReasoningService) that sends
//!   the healing prompt and parses the reply

pub mod client;
pub mod reasoner;

pub use client::{ChatMessage, ChatRequest, ChatResponse, ChatResponseChoice, LlmClient, Role};
pub use reasoner::LlmReasoner;
