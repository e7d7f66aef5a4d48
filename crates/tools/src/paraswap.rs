//! ParaSwap swap-routing server.
//!
//! One tool, `swap`, which quotes a route via the ParaSwap `/prices`
//! API and builds an unsigned transaction via `/transactions/{chain}`.
//! The transaction is returned to the client for the user's wallet to
//! sign; nothing is ever signed or broadcast server-side.

use std::sync::Arc;

use serde_json::Value;

use w3_mcp::server::ToolServer;

use crate::args::{req_f64, req_str};
use crate::http::ToolHttp;

const PARASWAP_BASE: &str = "https://api.paraswap.io";
const MORALIS_BASE: &str = "https://deep-index.moralis.io/api/v2.2";

/// ParaSwap's sentinel address for the chain's native asset.
const NATIVE_TOKEN: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
const NATIVE_DECIMALS: u32 = 18;

/// Slippage tolerance in basis points (2.5%).
const SLIPPAGE_BPS: u32 = 250;

pub fn server(http: Arc<ToolHttp>, moralis_api_key: String) -> ToolServer {
    let ctx = Arc::new(SwapContext {
        http,
        moralis_api_key,
    });
    ToolServer::new("paraswap-mcp-server", "1.0.0").tool(
        "swap",
        "Swap coins through an aggregated DEX route, returning an unsigned transaction",
        serde_json::json!({
            "type": "object",
            "properties": {
                "walletAddress": {
                    "type": "string",
                    "description": "The user wallet address that trades the token"
                },
                "inTokenAddress": {
                    "type": "string",
                    "description": "The token address the user trades out of"
                },
                "outTokenAddress": {
                    "type": "string",
                    "description": "The token address the user trades into"
                },
                "chainId": {
                    "type": "string",
                    "enum": ["1", "56", "8453"],
                    "description": "Chain ID, supported values: 1 (Ethereum), 56 (BSC), 8453 (Base)"
                },
                "amountIn": {
                    "type": "number",
                    "exclusiveMinimum": 0,
                    "description": "The token amount the user trades out"
                }
            },
            "required": ["walletAddress", "inTokenAddress", "outTokenAddress", "chainId", "amountIn"]
        }),
        Arc::new(move |args: Value| {
            let ctx = Arc::clone(&ctx);
            async move { swap_route(&ctx, args).await }
        }),
    )
}

struct SwapContext {
    http: Arc<ToolHttp>,
    moralis_api_key: String,
}

impl SwapContext {
    /// Decimals for a token: the native sentinel is always 18, ERC20
    /// decimals come from token metadata.
    async fn decimals(&self, token: &str, chain_id: &str) -> Result<u32, String> {
        if token.eq_ignore_ascii_case(NATIVE_TOKEN) {
            return Ok(NATIVE_DECIMALS);
        }
        let chain = match chain_id {
            "1" => "eth",
            "56" => "bsc",
            "8453" => "base",
            other => return Err(format!("unsupported chainId: {other}")),
        };
        let query = [
            ("chain".to_string(), chain.to_string()),
            ("addresses[0]".to_string(), token.to_lowercase()),
        ];
        let data = self
            .http
            .get_json(
                &format!("{MORALIS_BASE}/erc20/metadata"),
                &query,
                &[
                    ("accept", "application/json"),
                    ("X-API-Key", &self.moralis_api_key),
                ],
            )
            .await
            .map_err(|e| format!("failed to fetch token metadata: {e}"))?;

        data.as_array()
            .and_then(|a| a.first())
            .and_then(|t| t.get("decimals"))
            .and_then(|d| {
                d.as_str()
                    .and_then(|s| s.parse::<u32>().ok())
                    .or_else(|| d.as_u64().map(|n| n as u32))
            })
            .ok_or_else(|| format!("no decimals in metadata for {token}"))
    }
}

/// Scale a human token amount to its integer on-chain representation.
fn scale_amount(amount: f64, decimals: u32) -> String {
    let scaled = amount * 10f64.powi(decimals as i32);
    format!("{:.0}", scaled)
}

fn build_tx_body(price_route: &Value, dest_decimals: u32, wallet: &str) -> Value {
    serde_json::json!({
        "srcToken": price_route["srcToken"],
        "srcDecimals": price_route["srcDecimals"],
        "destToken": price_route["destToken"],
        "destDecimals": dest_decimals,
        "srcAmount": price_route["srcAmount"],
        "slippage": SLIPPAGE_BPS,
        "priceRoute": price_route,
        "userAddress": wallet,
        "txOrigin": wallet,
        "receiver": wallet,
    })
}

async fn swap_route(ctx: &SwapContext, args: Value) -> String {
    let wallet = match req_str(&args, "walletAddress") {
        Ok(v) => v.to_string(),
        Err(e) => return e,
    };
    let in_token = match req_str(&args, "inTokenAddress") {
        Ok(v) => v.to_string(),
        Err(e) => return e,
    };
    let out_token = match req_str(&args, "outTokenAddress") {
        Ok(v) => v.to_string(),
        Err(e) => return e,
    };
    let chain_id = match req_str(&args, "chainId") {
        Ok(v) => v.to_string(),
        Err(e) => return e,
    };
    let amount_in = match req_f64(&args, "amountIn") {
        Ok(v) if v > 0.0 => v,
        Ok(_) => return "amountIn must be greater than zero".into(),
        Err(e) => return e,
    };

    let src_decimals = match ctx.decimals(&in_token, &chain_id).await {
        Ok(d) => d,
        Err(e) => return e,
    };
    let dest_decimals = match ctx.decimals(&out_token, &chain_id).await {
        Ok(d) => d,
        Err(e) => return e,
    };

    let query = [
        ("srcToken".to_string(), in_token.clone()),
        ("srcDecimals".to_string(), src_decimals.to_string()),
        ("destToken".to_string(), out_token.clone()),
        ("destDecimals".to_string(), dest_decimals.to_string()),
        ("amount".to_string(), scale_amount(amount_in, src_decimals)),
        ("network".to_string(), chain_id.clone()),
    ];
    let prices = match ctx
        .http
        .get_json(&format!("{PARASWAP_BASE}/prices"), &query, &[])
        .await
    {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "ParaSwap price quote failed");
            return format!("failed to quote swap route: {e}");
        }
    };
    let price_route = match prices.get("priceRoute") {
        Some(r) => r.clone(),
        None => return format!("no route found for this pair: {}", prices),
    };

    let body = build_tx_body(&price_route, dest_decimals, &wallet);
    match ctx
        .http
        .post_json(&format!("{PARASWAP_BASE}/transactions/{chain_id}"), &body)
        .await
    {
        Ok(tx) => serde_json::to_string_pretty(&tx).unwrap_or_else(|_| tx.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "ParaSwap transaction build failed");
            format!("failed to build swap transaction: {e}")
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
