//! GoPlus token security server.
//!
//! One tool, `token-security-api`, which scans a token contract via the
//! GoPlus Labs API and renders a markdown risk report.

use std::sync::Arc;

use serde_json::Value;

use w3_mcp::server::ToolServer;

use crate::args::req_str;
use crate::http::ToolHttp;

const GOPLUS_BASE: &str = "https://api.gopluslabs.io/api/v1";

pub fn server(http: Arc<ToolHttp>) -> ToolServer {
    ToolServer::new("goplus-mcp-server", "1.0.0").tool(
        "token-security-api",
        "Scan crypto token security, any token address will scan",
        serde_json::json!({
            "type": "object",
            "properties": {
                "token_address": {
                    "type": "string",
                    "description": "The address of the token to scan"
                },
                "chain_id": {
                    "type": "string",
                    "enum": ["1", "56", "137", "8453"],
                    "description": "Chain ID, supported values: 1 (Ethereum), 56 (BSC), 137 (Polygon), 8453 (Base)"
                }
            },
            "required": ["token_address", "chain_id"]
        }),
        Arc::new(move |args: Value| {
            let http = Arc::clone(&http);
            async move { token_security(&http, args).await }
        }),
    )
}

async fn token_security(http: &ToolHttp, args: Value) -> String {
    let token_address = match req_str(&args, "token_address") {
        Ok(v) => v.to_lowercase(),
        Err(e) => return e,
    };
    let chain_id = match req_str(&args, "chain_id") {
        Ok(v) => v.to_string(),
        Err(e) => return e,
    };

    let url = format!("{GOPLUS_BASE}/token_security/{chain_id}");
    let query = [("contract_addresses".to_string(), token_address.clone())];

    let data = match http.get_json(&url, &query, &[("accept", "*/*")]).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, token = %token_address, "GoPlus request failed");
            return format!("Failed to fetch token security data: {e}");
        }
    };

    if data.get("code").and_then(Value::as_i64) != Some(1) {
        return "Failed to fetch token security data, please try again later.".into();
    }
    let info = match data.get("result").and_then(|r| r.get(&token_address)) {
        Some(info) => info,
        None => return "No security data found for this token.".into(),
    };

    format_security_report(&chain_id, &token_address, info)
}

// GoPlus encodes booleans as "0"/"1" strings.
fn flag(info: &Value, key: &str) -> bool {
    info.get(key).and_then(Value::as_str) == Some("1")
}

fn field<'a>(info: &'a Value, key: &str) -> &'a str {
    info.get(key).and_then(Value::as_str).unwrap_or("unknown")
}

fn percent(info: &Value, key: &str) -> Option<f64> {
    info.get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| *v > 0.0)
}

/// Render the GoPlus result for one token as a markdown report.
fn format_security_report(chain_id: &str, token_address: &str, info: &Value) -> String {
    let risks: Vec<&str> = [
        ("is_honeypot", "honeypot risk"),
        ("cannot_buy", "cannot be bought"),
        ("cannot_sell_all", "cannot sell all holdings"),
        ("slippage_modifiable", "slippage is modifiable"),
        ("is_blacklisted", "has a blacklist mechanism"),
        ("can_take_back_ownership", "ownership can be reclaimed"),
        ("hidden_owner", "hidden owner"),
        ("selfdestruct", "contract can self-destruct"),
        ("external_call", "external call risk"),
    ]
    .iter()
    .filter(|(key, _)| flag(info, key))
    .map(|(_, label)| *label)
    .collect();

    let name = field(info, "token_name");
    let symbol = field(info, "token_symbol");

    let mut out = format!("## {name} ({symbol}) security analysis\n\n");

    if risks.is_empty() {
        out.push_str("### No obvious security risks found\n\n");
    } else {
        out.push_str("### Potential security risks\n\n");
        for risk in &risks {
            out.push_str("- WARNING: ");
            out.push_str(risk);
            out.push('\n');
        }
        out.push('\n');
    }

    let mut taxes = Vec::new();
    if let Some(buy) = percent(info, "buy_tax") {
        taxes.push(format!("buy tax: {}%", buy * 100.0));
    }
    if let Some(sell) = percent(info, "sell_tax") {
        taxes.push(format!("sell tax: {}%", sell * 100.0));
    }
    if !taxes.is_empty() {
        out.push_str("### Token taxes\n");
        out.push_str(&taxes.join("\n"));
        out.push_str("\n\n");
    }

    let creator_percent = percent(info, "creator_percent")
        .map(|p| format!("{:.2}%", p * 100.0))
        .unwrap_or_else(|| "unknown".into());
    out.push_str("### Basic info\n");
    out.push_str(&format!("token name: {name}\n"));
    out.push_str(&format!("token symbol: {symbol}\n"));
    out.push_str(&format!("holder count: {}\n", field(info, "holder_count")));
    out.push_str(&format!("creator: {}\n", field(info, "creator_address")));
    out.push_str(&format!("creator holdings: {creator_percent}\n"));
    out.push_str(&format!(
        "open source: {}\n\n",
        if flag(info, "is_open_source") { "yes" } else { "no" }
    ));

    out.push_str(&format!(
        "Details: https://gopluslabs.io/token-security/{chain_id}/{token_address}"
    ));
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
