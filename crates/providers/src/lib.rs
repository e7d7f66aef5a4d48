//! `w3-providers` — LLM provider adapters for w3chat.
//!
//! One adapter ships today: [`openai::OpenAiProvider`], which speaks the
//! OpenAI chat completions contract (OpenAI, Ollama, vLLM, Together, and
//! friends). Both pipeline passes go through the same [`traits::LlmProvider`]
//! trait; they differ only in their request (tools vs none, temperature).

pub mod openai;
pub mod sse;
pub mod traits;

pub use openai::OpenAiProvider;
pub use traits::{GenerationRequest, LlmProvider};

/// Map reqwest failures onto the shared error type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> w3_domain::Error {
    if e.is_timeout() {
        w3_domain::Error::Timeout(e.to_string())
    } else {
        w3_domain::Error::Http(e.to_string())
    }
}
