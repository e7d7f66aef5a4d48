//! Server half: SSE session transport and the per-server session registry.

mod registry;
mod transport;

pub use registry::{ServerTool, SessionRegistry, ToolServer};
pub use transport::{PostOutcome, SessionTransport, TransportEvent};
