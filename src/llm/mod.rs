//! LLM integration module.
//!
//! Provides the structured-generation boundary, an OpenAI-compatible client
//! implementing it, and the prompts used to ask judges for verdicts.

mod client;
mod generator;
mod prompts;

pub use client::{LlmClient, LlmResponse, Message, Role};
pub use generator::{Generation, GenerationRequest, StructuredGenerator};
pub use prompts::{MAX_REASONING_CHARS, Prompts};
