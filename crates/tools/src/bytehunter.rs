//! ByteHunter transaction scam analysis server.
//!
//! One tool, `analyze-transaction-if-scam`, which submits a transaction
//! hash to the ByteHunter analysis API and renders a markdown verdict
//! with the detected attack type.

use std::sync::Arc;

use serde_json::Value;

use w3_mcp::server::ToolServer;

use crate::args::req_str;
use crate::http::ToolHttp;

const BYTEHUNTER_URL: &str = "https://backend.bytehunter.site/web3/v1/public/analysisTxInfo";

// The API requires a user address even for public lookups.
const DEFAULT_USER_ADDRESS: &str = "0x96c8064708694e4a9f620fa0ab79e2b5dfe4bd24";

fn attack_type_label(code: i64) -> &'static str {
    match code {
        1 => "Private Key Leak",
        2 => "Seaport Contract Order Forgery",
        3 => "Blur Contract Order Forgery",
        4 => "Approve Authorization (ERC20)",
        5 => "ApprovalForAll Authorization (ERC721)",
        6 => "Permit Authorization",
        7 => "Address Poisoning",
        8 => "Token Risk",
        9 => "Swap Risk",
        10 => "Transfer Address Risk",
        _ => "Unknown attack type",
    }
}

pub fn server(http: Arc<ToolHttp>) -> ToolServer {
    ToolServer::new("bytehunter-mcp-server", "1.0.0").tool(
        "analyze-transaction-if-scam",
        "analyze a transaction to determine if it is a scam",
        serde_json::json!({
            "type": "object",
            "properties": {
                "transaction_hash": {
                    "type": "string",
                    "description": "transaction hash"
                },
                "chain_id": {
                    "type": "string",
                    "description": "chain id"
                }
            },
            "required": ["transaction_hash", "chain_id"]
        }),
        Arc::new(move |args: Value| {
            let http = Arc::clone(&http);
            async move { analyze_transaction(&http, args).await }
        }),
    )
}

async fn analyze_transaction(http: &ToolHttp, args: Value) -> String {
    let transaction_hash = match req_str(&args, "transaction_hash") {
        Ok(v) => v.to_string(),
        Err(e) => return e,
    };
    let chain_id = match req_str(&args, "chain_id") {
        Ok(v) => v.to_string(),
        Err(e) => return e,
    };

    let body = serde_json::json!({
        "chain_id": chain_id,
        "record": 1,
        "transaction_hash": transaction_hash,
        "user_address": DEFAULT_USER_ADDRESS,
    });

    let data = match http.post_json(BYTEHUNTER_URL, &body).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, tx = %transaction_hash, "ByteHunter request failed");
            return format!("Failed to analyze transaction: {e}");
        }
    };

    format_verdict(&transaction_hash, &data)
}

fn detail<'a>(info: &'a Value, key: &str) -> &'a str {
    info.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Render the ByteHunter result for one transaction as a markdown verdict.
fn format_verdict(transaction_hash: &str, data: &Value) -> String {
    let event_info = if data.get("code").and_then(Value::as_i64) == Some(200) {
        data.get("data").and_then(|d| d.get("event_info"))
    } else {
        None
    };

    let info = match event_info {
        Some(info) => info,
        None => {
            // No structured verdict; show the raw response so the model
            // can still reason about it.
            let raw = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            return format!("No scam analysis available for this transaction.\n\n```json\n{raw}\n```");
        }
    };

    let attack_type = info.get("attack_type").and_then(Value::as_i64).unwrap_or(0);

    let mut out = format!("## Transaction scam analysis\n\ntransaction: {transaction_hash}\n\n");
    if attack_type > 0 {
        out.push_str("### Verdict: SCAM DETECTED\n\n");
        out.push_str(&format!(
            "attack type: {} (code {attack_type})\n",
            attack_type_label(attack_type)
        ));
    } else {
        out.push_str("### Verdict: no known attack pattern detected\n");
    }

    let event = detail(info, "event");
    let network = detail(info, "network");
    let occurrence_time = detail(info, "occurrence_time");
    if !event.is_empty() || !network.is_empty() || !occurrence_time.is_empty() {
        out.push_str("\n### Event details\n");
        if !event.is_empty() {
            out.push_str(&format!("event: {event}\n"));
        }
        if !network.is_empty() {
            out.push_str(&format!("network: {network}\n"));
        }
        if !occurrence_time.is_empty() {
            out.push_str(&format!("occurred: {occurrence_time}\n"));
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
