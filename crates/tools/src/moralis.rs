//! Moralis market-data server.
//!
//! Five tools over the Moralis deep-index API: trending tokens, token
//! search, batch ERC20 metadata, wallet holdings, and wallet PnL.
//! Responses come back as pretty-printed JSON; the analysis pass turns
//! them into prose.

use std::sync::Arc;

use serde_json::Value;

use w3_mcp::server::ToolServer;

use crate::args::{opt_f64, opt_u64, req_str};
use crate::http::ToolHttp;

const MORALIS_BASE: &str = "https://deep-index.moralis.io/api/v2.2";

/// Map a numeric chain id to the slug Moralis expects.
fn chain_slug(chain_id: &str) -> Option<&'static str> {
    match chain_id {
        "1" => Some("eth"),
        "56" => Some("bsc"),
        "137" => Some("polygon"),
        "8453" => Some("base"),
        _ => None,
    }
}

fn chain_schema(values: &[&str]) -> Value {
    serde_json::json!({
        "type": "string",
        "enum": values,
        "description": "Chain ID, supported values: 1 (Ethereum), 56 (BSC), 137 (Polygon), 8453 (Base)"
    })
}

struct MoralisApi {
    http: Arc<ToolHttp>,
    api_key: String,
}

impl MoralisApi {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, String> {
        let url = format!("{MORALIS_BASE}/{path}");
        self.http
            .get_json(
                &url,
                query,
                &[("accept", "application/json"), ("X-API-Key", &self.api_key)],
            )
            .await
            .map_err(|e| {
                tracing::warn!(path, error = %e, "Moralis request failed");
                format!("Moralis request failed: {e}")
            })
    }
}

pub fn server(http: Arc<ToolHttp>, api_key: String) -> ToolServer {
    let api = Arc::new(MoralisApi { http, api_key });

    let trending = Arc::clone(&api);
    let search = Arc::clone(&api);
    let metadata = Arc::clone(&api);
    let wallet_tokens = Arc::clone(&api);
    let wallet_pnl = api;

    ToolServer::new("moralis-mcp-server", "1.0.0")
        .tool(
            "trending_tokens",
            "Get trending tokens on a specific blockchain network & chain id",
            serde_json::json!({
                "type": "object",
                "properties": { "chain_id": chain_schema(&["1", "56", "8453"]) },
                "required": ["chain_id"]
            }),
            Arc::new(move |args: Value| {
                let api = Arc::clone(&trending);
                async move { trending_tokens(&api, args).await }
            }),
        )
        .tool(
            "search_tokens",
            "Search tokens by name or symbol across chains",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search keyword" },
                    "limit": { "type": "integer", "description": "Max results, default 10" }
                },
                "required": ["query"]
            }),
            Arc::new(move |args: Value| {
                let api = Arc::clone(&search);
                async move { search_tokens(&api, args).await }
            }),
        )
        .tool(
            "tokens_metadata",
            "Get metadata for multiple ERC20 tokens",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "addresses": {
                        "type": "array",
                        "items": { "type": "string", "pattern": "^0x[a-fA-F0-9]{40}$" },
                        "minItems": 1,
                        "maxItems": 20,
                        "description": "Token contract addresses"
                    },
                    "chain_id": chain_schema(&["1", "56", "137", "8453"])
                },
                "required": ["addresses", "chain_id"]
            }),
            Arc::new(move |args: Value| {
                let api = Arc::clone(&metadata);
                async move { tokens_metadata(&api, args).await }
            }),
        )
        .tool(
            "wallet_tokens",
            "Get all tokens owned by a wallet address",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "string",
                        "pattern": "^0x[a-fA-F0-9]{40}$",
                        "description": "Wallet address"
                    },
                    "chain_id": chain_schema(&["1", "56", "137", "8453"]),
                    "min_usd_value": {
                        "type": "number",
                        "description": "Minimum USD value per token, default 10"
                    }
                },
                "required": ["address", "chain_id"]
            }),
            Arc::new(move |args: Value| {
                let api = Arc::clone(&wallet_tokens);
                async move { wallet_token_list(&api, args).await }
            }),
        )
        .tool(
            "wallet_pnl",
            "Get wallet profit/pnl summary",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "string",
                        "pattern": "^0x[a-fA-F0-9]{40}$",
                        "description": "Wallet address"
                    },
                    "chain_id": chain_schema(&["1", "56", "137", "8453"])
                },
                "required": ["address", "chain_id"]
            }),
            Arc::new(move |args: Value| {
                let api = Arc::clone(&wallet_pnl);
                async move { wallet_pnl_summary(&api, args).await }
            }),
        )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn chain_from_args(args: &Value) -> Result<&'static str, String> {
    let chain_id = req_str(args, "chain_id")?;
    chain_slug(chain_id).ok_or_else(|| format!("unsupported chain_id: {chain_id}"))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

async fn trending_tokens(api: &MoralisApi, args: Value) -> String {
    let chain = match chain_from_args(&args) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let query = [
        ("chain".to_string(), chain.to_string()),
        ("limit".to_string(), "10".to_string()),
    ];
    match api.get("tokens/trending", &query).await {
        Ok(data) => pretty(&data),
        Err(e) => e,
    }
}

async fn search_tokens(api: &MoralisApi, args: Value) -> String {
    let query_str = match req_str(&args, "query") {
        Ok(q) => q.to_string(),
        Err(e) => return e,
    };
    let limit = opt_u64(&args, "limit", 10);
    let query = [
        ("query".to_string(), query_str),
        ("chains".to_string(), "eth,bsc,base".to_string()),
        ("limit".to_string(), limit.to_string()),
    ];
    match api.get("tokens/search", &query).await {
        Ok(data) => pretty(&data),
        Err(e) => e,
    }
}

async fn tokens_metadata(api: &MoralisApi, args: Value) -> String {
    let chain = match chain_from_args(&args) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let addresses: Vec<String> = match args.get("addresses").and_then(Value::as_array) {
        Some(arr) if !arr.is_empty() => arr
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.to_lowercase())
            .collect(),
        _ => return "missing required argument: addresses".into(),
    };

    let mut query = vec![("chain".to_string(), chain.to_string())];
    for (i, address) in addresses.iter().enumerate() {
        query.push((format!("addresses[{i}]"), address.clone()));
    }
    match api.get("erc20/metadata", &query).await {
        Ok(data) => pretty(&data),
        Err(e) => e,
    }
}

async fn wallet_token_list(api: &MoralisApi, args: Value) -> String {
    let chain = match chain_from_args(&args) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let address = match req_str(&args, "address") {
        Ok(a) => a.to_string(),
        Err(e) => return e,
    };
    let min_usd = opt_f64(&args, "min_usd_value").unwrap_or(10.0);

    let query = [
        ("chain".to_string(), chain.to_string()),
        ("limit".to_string(), "100".to_string()),
    ];
    match api.get(&format!("wallets/{address}/tokens"), &query).await {
        Ok(data) => pretty(&filter_wallet_tokens(data, min_usd)),
        Err(e) => e,
    }
}

async fn wallet_pnl_summary(api: &MoralisApi, args: Value) -> String {
    let chain = match chain_from_args(&args) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let address = match req_str(&args, "address") {
        Ok(a) => a.to_string(),
        Err(e) => return e,
    };

    let query = [("chain".to_string(), chain.to_string())];
    match api
        .get(&format!("wallets/{address}/profitability/summary"), &query)
        .await
    {
        Ok(data) => pretty(&data),
        Err(e) => e,
    }
}

/// Drop dust positions below `min_usd` from a wallet tokens response.
fn filter_wallet_tokens(mut data: Value, min_usd: f64) -> Value {
    if let Some(result) = data.get_mut("result").and_then(Value::as_array_mut) {
        result.retain(|token| {
            token
                .get("usd_value")
                .and_then(Value::as_f64)
                .map(|v| v >= min_usd)
                .unwrap_or(true)
        });
    }
    data
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
