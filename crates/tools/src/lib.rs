//! `w3-tools` — built-in MCP tool servers for w3chat.
//!
//! Four servers ship in-process, each mounted under `/mcp/sse/{name}`:
//! - `goplus`: token security scanning via GoPlus Labs
//! - `moralis`: market data (trending, search, metadata, wallet holdings, PnL)
//! - `paraswap`: DEX swap routing, returning unsigned transactions
//! - `bytehunter`: transaction scam analysis

use std::sync::Arc;

use w3_domain::config::ToolsConfig;
use w3_domain::error::{Error, Result};
use w3_mcp::server::ToolServer;

mod args;
pub mod bytehunter;
pub mod goplus;
pub mod http;
pub mod moralis;
pub mod paraswap;

pub use http::ToolHttp;

/// Build every tool server named in `cfg.mount`, paired with the mount
/// name it serves under.
///
/// The Moralis API key is read once from the configured environment
/// variable; it is required for the moralis and paraswap servers.
pub fn builtin_servers(cfg: &ToolsConfig) -> Result<Vec<(String, ToolServer)>> {
    let http = Arc::new(ToolHttp::new()?);
    let mut servers = Vec::new();

    for name in &cfg.mount {
        let server = match name.as_str() {
            "bytehunter" => bytehunter::server(Arc::clone(&http)),
            "goplus" => goplus::server(Arc::clone(&http)),
            "moralis" => moralis::server(Arc::clone(&http), moralis_key(cfg)?),
            "paraswap" => paraswap::server(Arc::clone(&http), moralis_key(cfg)?),
            other => {
                return Err(Error::Config(format!("unknown tool server: {other}")));
            }
        };
        servers.push((name.clone(), server));
    }

    Ok(servers)
}

fn moralis_key(cfg: &ToolsConfig) -> Result<String> {
    std::env::var(&cfg.moralis_api_key_env).map_err(|_| {
        Error::Config(format!(
            "missing Moralis API key: set {}",
            cfg.moralis_api_key_env
        ))
    })
}
