//! Shared gateway state, built once at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use w3_domain::config::Config;
use w3_domain::error::{Error, Result};
use w3_mcp::server::SessionRegistry;
use w3_providers::openai::OpenAiProvider;
use w3_providers::traits::LlmProvider;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmProvider>,
    /// Client used for outbound MCP connections during chat turns.
    pub http: reqwest::Client,
    /// Built-in tool servers, keyed by mount name under `/mcp/sse/{name}`.
    pub mounts: Arc<HashMap<String, Arc<SessionRegistry>>>,
}

impl AppState {
    pub fn build(config: Arc<Config>) -> Result<Self> {
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(&config.llm)?);

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let mut mounts = HashMap::new();
        for (mount, server) in w3_tools::builtin_servers(&config.tools)? {
            tracing::info!(mount = %mount, server = server.name(), "mounting tool server");
            mounts.insert(mount, SessionRegistry::new(server));
        }

        Ok(Self {
            config,
            llm,
            http,
            mounts: Arc::new(mounts),
        })
    }

    /// Close every live MCP session. Used on shutdown.
    pub fn close_sessions(&self) {
        for registry in self.mounts.values() {
            registry.close_all();
        }
    }
}
