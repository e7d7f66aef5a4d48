//! The analysis pass: turns raw tool output into prose.

use w3_domain::config::LlmConfig;
use w3_domain::tool::Message;
use w3_providers::traits::GenerationRequest;

use crate::runtime::turn::ToolRecord;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a professional Web3 data analyst. Analyze the \
     provided tool call results and explain what they mean for the user: surface risks, notable \
     numbers, and actionable insight. Be precise and do not invent data.";

const ANALYSIS_TEMPERATURE: f32 = 0.1;

/// Build the second-pass request: no tools, low temperature, and the
/// completed tool records serialized as the user prompt.
pub fn analysis_request(llm: &LlmConfig, records: &[ToolRecord]) -> GenerationRequest {
    let serialized = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".into());
    GenerationRequest {
        messages: vec![
            Message::system(ANALYSIS_SYSTEM_PROMPT),
            Message::user(format!(
                "Analyze the following tool call results:\n{serialized}"
            )),
        ],
        tools: Vec::new(),
        temperature: Some(ANALYSIS_TEMPERATURE),
        model: llm.analysis_model().to_string(),
    }
}
