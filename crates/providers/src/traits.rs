use w3_domain::error::Result;
use w3_domain::stream::{BoxStream, StreamEvent};
use w3_domain::tool::{Message, ToolDefinition};

/// A provider-agnostic streaming generation request.
///
/// The primary pass fills `tools`; the analysis pass leaves them empty
/// and pins `temperature` low.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke. Empty disables tool use.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f32>,
    pub model: String,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            temperature: None,
            model: model.into(),
        }
    }
}

/// Trait every LLM adapter implements.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a generation request and return a stream of events.
    ///
    /// The stream always terminates with exactly one
    /// [`StreamEvent::Done`], even when the upstream response is cut
    /// short.
    async fn chat_stream(
        &self,
        req: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
