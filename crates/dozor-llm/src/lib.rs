//! OpenAI-compatible chat client with retry classification, jittered
//! backoff, a single-retry fallback provider, and per-provider circuit
//! breakers (§4.8).

#![forbid(unsafe_code)]

mod client;
mod error;
mod kb;
mod wire;

pub use client::{LlmClient, ProviderConfig};
pub use error::LlmError;
pub use kb::{CIRCUIT_OPEN_MESSAGE as KB_CIRCUIT_OPEN_MESSAGE, KbClient, KbConfig};
pub use wire::{ChatMessage, ChatReply, WireFunctionCall, WireToolCall};
