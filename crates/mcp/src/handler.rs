//! Tool execution seam shared by the server registry and the client pool.

use async_trait::async_trait;
use serde_json::Value;

/// Executes one named tool with JSON arguments and produces text.
///
/// Handlers are infallible by contract: upstream failures are folded into
/// the returned text so the model sees them like any other tool output.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> String;
}

/// Blanket impl so plain async closures can be handlers.
#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = String> + Send,
{
    async fn call(&self, arguments: Value) -> String {
        self(arguments).await
    }
}
